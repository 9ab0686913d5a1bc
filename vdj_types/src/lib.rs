//! vdj_types
// Copyright (c) 2021 10x Genomics, Inc. All rights reserved.

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

// From https://danielkeep.github.io/tlborm/book/blk-counting.html
macro_rules! replace_expr {
    ($_t:tt $sub:expr) => {
        $sub
    };
}

macro_rules! count_tts {
    ($($tts:tt)*) => {0usize $(+ replace_expr!($tts 1usize))*};
}

macro_rules! make_enum {
    (
        name: $name:ident,
        variants:[$( ($field:ident, $lit: literal) ,)*],
        const_var_name: $const_var_name:ident,
    ) => {
        pub const $const_var_name: [&str; count_tts!($($field)*)] = [
            $($lit,)*
        ];

        #[derive(
            Debug,
            Copy,
            Clone,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
            Hash,
        )]
        pub enum $name {
            $(
                #[serde(rename = $lit)]
                $field,
            )*
        }

        impl $name {
            pub fn all() -> [Self; count_tts!($($field)*)] {
                [
                    $($name::$field,)*
                ]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", match self {
                    $(
                        $name::$field => $lit,
                    )*
                })
            }
        }

        impl From<$name> for &'static str {
            fn from(src: $name) -> &'static str {
                match src {
                    $(
                        $name::$field => $lit,
                    )*
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(
                        $lit => Ok($name::$field),
                    )*
                    unknown => Err(
                        format!("Unknown variant '{}' for {}. Supported variants are: [{}]", unknown, stringify!($name), $const_var_name.join(", "))
                    )
                }
            }
        }
    };
}

make_enum! {
    name: VdjRegion,
    variants: [
        (V, "V"), // Variable region
        (D, "D"), // Diversity region
        (J, "J"), // Joining region
        (C, "C"), // Constant region
    ],
    const_var_name: VDJ_REGIONS,
}

make_enum! {
    name: ReferencePoint,
    variants: [
        (VBegin, "VBegin"),
        (CDR3Begin, "CDR3Begin"),
        (VEnd, "VEnd"),
        (DBegin, "DBegin"),
        (DEnd, "DEnd"),
        (JBegin, "JBegin"),
        (CDR3End, "CDR3End"),
        (FR4End, "FR4End"),
        (CBegin, "CBegin"),
        (CEnd, "CEnd"),
    ],
    const_var_name: REFERENCE_POINTS,
}

impl ReferencePoint {
    /// The gene whose sequence defines the position of this point.
    pub fn region(self) -> VdjRegion {
        use ReferencePoint::*;
        match self {
            VBegin | CDR3Begin | VEnd => VdjRegion::V,
            DBegin | DEnd => VdjRegion::D,
            JBegin | CDR3End | FR4End => VdjRegion::J,
            CBegin | CEnd => VdjRegion::C,
        }
    }
}

/// Features that can be referred to by name in parameter files.
const NAMED_FEATURES: [(&str, ReferencePoint, ReferencePoint); 6] = [
    ("CDR3", ReferencePoint::CDR3Begin, ReferencePoint::CDR3End),
    ("VRegion", ReferencePoint::VBegin, ReferencePoint::VEnd),
    ("JRegion", ReferencePoint::JBegin, ReferencePoint::FR4End),
    ("VDJRegion", ReferencePoint::VBegin, ReferencePoint::FR4End),
    ("VCDR3Part", ReferencePoint::CDR3Begin, ReferencePoint::VEnd),
    ("JCDR3Part", ReferencePoint::JBegin, ReferencePoint::CDR3End),
];

/// A region of a rearranged receptor sequence delimited by reference points.
///
/// A feature made of several disjoint regions is composite. Only non-composite
/// features can serve as a clonal (assembling) feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct GeneFeature {
    regions: Vec<(ReferencePoint, ReferencePoint)>,
}

impl GeneFeature {
    pub fn new(first: ReferencePoint, last: ReferencePoint) -> Self {
        GeneFeature {
            regions: vec![(first, last)],
        }
    }

    pub fn composite(regions: Vec<(ReferencePoint, ReferencePoint)>) -> Self {
        assert!(!regions.is_empty());
        GeneFeature { regions }
    }

    pub fn cdr3() -> Self {
        GeneFeature::new(ReferencePoint::CDR3Begin, ReferencePoint::CDR3End)
    }

    pub fn vdj_region() -> Self {
        GeneFeature::new(ReferencePoint::VBegin, ReferencePoint::FR4End)
    }

    pub fn is_composite(&self) -> bool {
        self.regions.len() > 1
    }

    pub fn first_point(&self) -> ReferencePoint {
        self.regions[0].0
    }

    pub fn last_point(&self) -> ReferencePoint {
        self.regions[self.regions.len() - 1].1
    }

    pub fn regions(&self) -> &[(ReferencePoint, ReferencePoint)] {
        &self.regions
    }
}

impl fmt::Display for GeneFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .regions
            .iter()
            .map(|&(first, last)| {
                NAMED_FEATURES
                    .iter()
                    .find(|(_, a, b)| *a == first && *b == last)
                    .map_or_else(|| format!("{{{first}:{last}}}"), |(name, _, _)| name.to_string())
            })
            .collect();
        write!(f, "{}", parts.join("+"))
    }
}

impl From<GeneFeature> for String {
    fn from(feature: GeneFeature) -> String {
        feature.to_string()
    }
}

impl FromStr for GeneFeature {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut regions = Vec::new();
        for part in s.split('+') {
            let part = part.trim();
            if let Some(&(_, first, last)) = NAMED_FEATURES.iter().find(|(name, _, _)| *name == part) {
                regions.push((first, last));
            } else if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                let (first, last) = inner
                    .split_once(':')
                    .ok_or_else(|| format!("Malformed gene feature '{part}'"))?;
                regions.push((first.parse()?, last.parse()?));
            } else {
                return Err(format!(
                    "Unknown gene feature '{}'. Supported named features are: [{}]",
                    part,
                    NAMED_FEATURES
                        .iter()
                        .map(|(name, _, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }
        Ok(GeneFeature { regions })
    }
}

impl TryFrom<String> for GeneFeature {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

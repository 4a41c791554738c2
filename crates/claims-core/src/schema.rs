//! Claim-type schema lookup.
//!
//! A parser is only constructed for a claim type its schema lookup recognizes.
//! [`SchemaRegistry::builtin`] carries the reference headers for the four CMS
//! claim categories; registries can also be loaded from YAML of the form
//!
//! ```yaml
//! inpatient: [subjectID, claimID, startDate, dx]
//! pde: [subjectID, fillID, startDate, ndc]
//! ```

use crate::{ClaimsError, ClaimsResult};
use claims_types::ClaimType;
use std::collections::BTreeMap;

/// Resolves claim-type tags to their expected field names.
pub trait SchemaLookup {
    /// Returns `true` when `tag` names a claim type with a known header.
    fn is_recognized(&self, tag: &str) -> bool {
        self.expected_fields(tag).is_some()
    }

    /// Field names expected on claim lines of `tag`, if it is recognized.
    fn expected_fields(&self, tag: &str) -> Option<&[String]>;
}

/// Reference headers keyed by claim type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    headers: BTreeMap<ClaimType, Vec<String>>,
}

const COMMON_FIELDS: &[&str] = &[
    "subjectID",
    "claimID",
    "claimLine",
    "startDate",
    "endDate",
    "providerID",
    "amount",
];

fn header(extra: &[&str]) -> Vec<String> {
    COMMON_FIELDS
        .iter()
        .chain(extra)
        .map(|field| field.to_string())
        .collect()
}

impl SchemaRegistry {
    /// Headers for `inpatient`, `outpatient`, `carrier` and `pde` claims.
    pub fn builtin() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            ClaimType::Inpatient,
            header(&[
                "admissionDate",
                "dischargeDate",
                "drg",
                "dx",
                "px",
                "attendingPhysician",
                "utilizationDays",
            ]),
        );
        headers.insert(
            ClaimType::Outpatient,
            header(&["dx", "px", "hcpcs", "attendingPhysician"]),
        );
        headers.insert(
            ClaimType::Carrier,
            header(&["dx", "hcpcs", "lineAmount", "providerSpecialty"]),
        );
        headers.insert(
            ClaimType::Pde,
            [
                "subjectID",
                "fillID",
                "startDate",
                "ndc",
                "quantity",
                "daysSupply",
                "amount",
                "prescriberID",
                "pharmacyID",
            ]
            .iter()
            .map(|field| field.to_string())
            .collect(),
        );
        Self { headers }
    }

    /// Parses a registry from YAML mapping claim-type tags to field lists.
    pub fn from_yaml_str(yaml: &str) -> ClaimsResult<Self> {
        let headers: BTreeMap<ClaimType, Vec<String>> =
            serde_yaml::from_str(yaml).map_err(ClaimsError::SchemaParse)?;
        Ok(Self { headers })
    }

    /// Claim types this registry knows about.
    pub fn claim_types(&self) -> impl Iterator<Item = ClaimType> + '_ {
        self.headers.keys().copied()
    }
}

impl SchemaLookup for SchemaRegistry {
    fn expected_fields(&self, tag: &str) -> Option<&[String]> {
        let claim_type = tag.parse::<ClaimType>().ok()?;
        self.headers.get(&claim_type).map(Vec::as_slice)
    }
}

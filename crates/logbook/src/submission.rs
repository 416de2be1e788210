//! Agent submission intake.
//!
//! The portal form contract: ten mandatory fields, optional property
//! facts, leasehold-only terms, and a hard ban on free-text marketing
//! copy. Field validation produces per-field stable codes; document
//! completeness decides SUBMITTED versus INCOMPLETE.

use chrono::{DateTime, Utc};
use common::{
    is_valid_uk_postcode, FieldError, PropertyType, RawListing, Tenure,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::documents::{DocumentRecord, DocumentType};

/// How the property is being sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SaleRoute {
    Auction,
    PrivateTreaty,
    OffMarket,
}

/// Council tax band A–H.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CouncilTaxBand {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

/// EPC rating A–G.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum EpcRating {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

/// The agent submission form.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AgentSubmission {
    #[validate(length(min = 1, max = 255))]
    pub full_address: String,

    #[validate(length(min = 1, max = 10))]
    pub postcode: String,

    /// Raw property type; normalised through the shared synonym table.
    pub property_type: String,

    /// Raw tenure; normalised through the shared synonym table.
    pub tenure: String,

    #[validate(range(min = 1.0, max = 100_000.0))]
    pub floor_area_sqm: f64,

    /// Guide price in whole GBP.
    #[validate(range(min = 1))]
    pub guide_price: i64,

    pub sale_route: SaleRoute,

    #[validate(length(min = 1, max = 120))]
    pub agent_firm: String,

    #[validate(length(min = 1, max = 120))]
    pub agent_name: String,

    #[validate(email)]
    pub agent_email: String,

    // Optional property facts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub council_tax_band: Option<CouncilTaxBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epc_rating: Option<EpcRating>,

    // Leasehold-only terms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_years_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_rent_annual: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_charge_annual: Option<i64>,

    #[serde(default)]
    pub has_planning_application: bool,

    /// Marketing copy is not a fact; its presence rejects the submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketing_text: Option<String>,
}

impl AgentSubmission {
    /// Normalised tenure, when the raw string maps.
    pub fn normalised_tenure(&self) -> Option<Tenure> {
        Tenure::from_raw(&self.tenure)
    }

    /// Normalised property type, when the raw string maps.
    pub fn normalised_property_type(&self) -> Option<PropertyType> {
        PropertyType::from_raw(&self.property_type)
    }
}

/// Validate the form, returning every field-level failure.
pub fn validate_submission(submission: &AgentSubmission) -> Result<(), Vec<FieldError>> {
    let mut errors: Vec<FieldError> = Vec::new();

    if let Err(report) = submission.validate() {
        for (field, failures) in report.field_errors() {
            for failure in failures {
                errors.push(FieldError::new(
                    field.to_string(),
                    "INVALID_FIELD",
                    failure
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("invalid value for {field}")),
                ));
            }
        }
    }

    if !is_valid_uk_postcode(&submission.postcode) {
        errors.push(FieldError::new(
            "postcode",
            "INVALID_POSTCODE",
            "not a UK postcode",
        ));
    }
    if submission.normalised_property_type().is_none() {
        errors.push(FieldError::new(
            "property_type",
            "UNMAPPED_PROPERTY_TYPE",
            format!("unmapped property type: {:?}", submission.property_type),
        ));
    }
    if submission.normalised_tenure().is_none() {
        errors.push(FieldError::new(
            "tenure",
            "UNMAPPED_TENURE",
            format!("unmapped tenure: {:?}", submission.tenure),
        ));
    }
    if submission
        .marketing_text
        .as_deref()
        .is_some_and(|text| !text.trim().is_empty())
    {
        errors.push(FieldError::new(
            "marketing_text",
            "UNEXPECTED_FIELD",
            "free-text marketing copy is not accepted",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Documents a submission must carry before it counts as SUBMITTED.
pub fn required_documents(submission: &AgentSubmission) -> Vec<DocumentType> {
    let mut required = vec![
        DocumentType::TitleRegister,
        DocumentType::Epc,
        DocumentType::FloorPlan,
    ];
    if submission.normalised_tenure() == Some(Tenure::Leasehold) {
        required.push(DocumentType::Lease);
    }
    if submission.has_planning_application {
        required.push(DocumentType::PlanningApproval);
    }
    required
}

/// Which required documents are absent from the given set.
pub fn missing_documents(
    submission: &AgentSubmission,
    documents: &[DocumentRecord],
) -> Vec<DocumentType> {
    required_documents(submission)
        .into_iter()
        .filter(|required| !documents.iter().any(|d| d.document_type == *required))
        .collect()
}

/// Deep-copied state of a submission at one version.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmissionSnapshot {
    /// `SUB-` + 12 lowercase hex characters.
    pub submission_id: String,
    pub submission: AgentSubmission,
    /// Document records current at this version.
    pub documents: Vec<DocumentRecord>,
}

impl SubmissionSnapshot {
    /// The document of a given type current in this snapshot, if any.
    pub fn document_of_type(&self, document_type: DocumentType) -> Option<&DocumentRecord> {
        self.documents
            .iter()
            .find(|d| d.document_type == document_type)
    }
}

/// Surface a submission snapshot to the deal engine as a raw listing.
///
/// The engine sees the portal as just another source; the listing then
/// passes the same structural validator as any other. Read-only: nothing
/// flows back into the logbook.
pub fn to_raw_listing(
    property_id: &str,
    snapshot: &SubmissionSnapshot,
    submitted_at: DateTime<Utc>,
) -> RawListing {
    let submission = &snapshot.submission;
    RawListing {
        source_id: "agent-portal".to_string(),
        source_name: "Agent Submission Portal".to_string(),
        source_listing_id: property_id.to_string(),
        address: submission.full_address.clone(),
        city: None,
        postcode: submission.postcode.clone(),
        property_type: submission.property_type.clone(),
        tenure: submission.tenure.clone(),
        asking_price: submission.guide_price,
        price_qualifier: Some("guide price".to_string()),
        bedrooms: submission.bedrooms,
        bathrooms: submission.bathrooms,
        square_feet: Some((submission.floor_area_sqm * 10.763_910_416_709_722) as u32),
        plot_acres: None,
        area: None,
        coordinates: None,
        listing_date: Some(submitted_at.date_naive()),
        listing_url: None,
    }
}

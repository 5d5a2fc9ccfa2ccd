mod fields;

pub use fields::*;

use sqlx::SqlitePool;

use crate::db;
use crate::error::{CertError, CertResult};
use crate::pdf::CertificateTemplate;

#[derive(Debug, Clone)]
pub enum IssueRequest {
    /// Looked up in the participant records.
    Participant {
        document_id: String,
        document_type: DocumentType,
    },
    /// Looked up in the organizing committee.
    Committee { document_id: String },
    /// Admin-entered, no lookup.
    Personalized {
        name: String,
        document_type: DocumentType,
        document_id: String,
        quality: String,
    },
}

#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub file_name: String,
    pub fields: CertificateFields,
    pub pdf: Vec<u8>,
}

pub async fn issue(
    pool: &SqlitePool,
    template: &CertificateTemplate,
    clock: &dyn Clock,
    request: IssueRequest,
) -> CertResult<IssuedCertificate> {
    let (source, document_id, document_type) = match request {
        IssueRequest::Participant {
            document_id,
            document_type,
        } => {
            let record = db::find_by_document(pool, &document_id)
                .await?
                .ok_or_else(|| CertError::NotFound(document_id.clone()))?;
            (CertificateSource::Participant(record), document_id, document_type)
        }
        IssueRequest::Committee { document_id } => {
            let member = db::find_committee_member(pool, &document_id)
                .await?
                .ok_or_else(|| CertError::NotFound(document_id.clone()))?;
            (
                CertificateSource::CommitteeMember(member),
                document_id,
                DocumentType::CitizenshipId,
            )
        }
        IssueRequest::Personalized {
            name,
            document_type,
            document_id,
            quality,
        } => (
            CertificateSource::Personalized { name, quality },
            document_id,
            document_type,
        ),
    };

    let fields = build_fields(&source, &document_id, document_type, clock.today());
    let pdf = template.render(&fields)?;
    let file_name = format!("{}{}", fields.name, source.file_suffix());

    tracing::info!(document_id = %document_id, file_name = %file_name, "certificate issued");

    Ok(IssuedCertificate {
        file_name,
        fields,
        pdf,
    })
}

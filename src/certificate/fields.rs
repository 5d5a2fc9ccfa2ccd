use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::db::{CommitteeMember, DocumentRecord};

const MONTHS_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

pub const COMMITTEE_ROLE: &str = "Member of the Organizing Committee";

/// Source of "today" for the issuance date line.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    CitizenshipId,
    IdentityCard,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::CitizenshipId, DocumentType::IdentityCard];

    pub fn label(self) -> &'static str {
        match self {
            DocumentType::CitizenshipId => "Citizenship ID",
            DocumentType::IdentityCard => "Identity Card",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            DocumentType::CitizenshipId => "citizenship_id",
            DocumentType::IdentityCard => "identity_card",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentType::ALL
            .into_iter()
            .find(|t| t.key() == s || t.label() == s)
            .ok_or_else(|| format!("unknown document type: {s}"))
    }
}

/// Where the certificate's data came from. Each variant has its own
/// formatting rules in [`build_fields`].
#[derive(Debug, Clone)]
pub enum CertificateSource {
    Participant(DocumentRecord),
    Personalized { name: String, quality: String },
    CommitteeMember(CommitteeMember),
}

impl CertificateSource {
    pub fn file_suffix(&self) -> &'static str {
        match self {
            CertificateSource::Participant(_) => "_Certificado.pdf",
            CertificateSource::Personalized { .. } => "_Certificado_Personalizado.pdf",
            CertificateSource::CommitteeMember(_) => "_Certificado_Logistica.pdf",
        }
    }
}

/// The four strings written into the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateFields {
    pub name: String,
    pub document: String,
    pub role: String,
    pub date: String,
}

pub fn build_fields(
    source: &CertificateSource,
    document_id: &str,
    document_type: DocumentType,
    today: NaiveDate,
) -> CertificateFields {
    let (name, document_type, role) = match source {
        CertificateSource::Participant(record) => (
            record.name.trim().to_uppercase(),
            document_type,
            role_line(&record.quality, &record.category),
        ),
        CertificateSource::Personalized { name, quality } => (
            name.trim().to_uppercase(),
            document_type,
            capitalize(quality.trim()),
        ),
        CertificateSource::CommitteeMember(member) => (
            member.full_name.to_uppercase(),
            DocumentType::CitizenshipId,
            COMMITTEE_ROLE.to_string(),
        ),
    };

    CertificateFields {
        name,
        document: document_line(document_type, document_id),
        role,
        date: date_line(today),
    }
}

pub fn document_line(document_type: DocumentType, document_id: &str) -> String {
    format!("{} Número {}", document_type.label(), document_id)
}

pub fn role_line(quality: &str, category: &str) -> String {
    let quality = capitalize(quality.trim());
    let category = category.trim().to_uppercase();
    format!("{} {}", quality, category).trim().to_string()
}

pub fn date_line(date: NaiveDate) -> String {
    format!(
        "Se expide a los ({}) días del mes de {} de {}",
        date.day(),
        MONTHS_ES[date.month0() as usize],
        date.year()
    )
}

/// First character upper-cased, the rest lower-cased.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

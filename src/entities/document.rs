// Documents attached to a student (transcripts, certificates, ...)
// The file itself stays where it is; we keep its path and a SHA-256 checksum.

use crate::db::record_event;
use crate::error::{RecordsResult, ValidationError};
use crate::validators::validate_date;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Transcript,
    Certificate,
    #[serde(rename = "ID Card")]
    IdCard,
    #[serde(rename = "Medical Record")]
    MedicalRecord,
    Other,
}

impl DocumentType {
    pub const ALL: [DocumentType; 5] = [
        DocumentType::Transcript,
        DocumentType::Certificate,
        DocumentType::IdCard,
        DocumentType::MedicalRecord,
        DocumentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Transcript => "Transcript",
            DocumentType::Certificate => "Certificate",
            DocumentType::IdCard => "ID Card",
            DocumentType::MedicalRecord => "Medical Record",
            DocumentType::Other => "Other",
        }
    }

    /// Case-insensitive name match; unknown names are not accepted
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim();
        DocumentType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
    }

    /// Menu choice 1-5; anything else files under Other
    pub fn from_choice(choice: &str) -> Self {
        choice
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| DocumentType::ALL.get(i).copied())
            .unwrap_or(DocumentType::Other)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub student_id: i64,
    pub document_type: String,
    pub name: String,
    pub file_path: Option<String>,
    pub upload_date: String,
    pub description: Option<String>,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub student_id: i64,
    pub document_type: DocumentType,
    pub name: String,
    pub file_path: Option<String>,
    pub description: Option<String>,
    /// None means today
    pub upload_date: Option<String>,
}

impl NewDocument {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::new("document_name", "required"));
        }
        if let Some(date) = &self.upload_date {
            if !validate_date(date) {
                return Err(ValidationError::new("upload_date", "expected YYYY-MM-DD"));
            }
        }
        Ok(())
    }
}

/// SHA-256 of a file's contents, hex encoded. None when the file can't be read.
pub fn file_checksum(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Some(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// REPOSITORY
// ============================================================================

pub fn add_document(conn: &Connection, new: &NewDocument) -> RecordsResult<i64> {
    new.validate()?;

    let file_path = new
        .file_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let checksum = file_path.and_then(|p| file_checksum(Path::new(p)));
    if file_path.is_some() && checksum.is_none() {
        debug!(path = ?file_path, "document file not readable, storing without checksum");
    }

    let upload_date = new
        .upload_date
        .clone()
        .unwrap_or_else(super::attendance::today);

    conn.execute(
        "INSERT INTO documents
            (student_id, document_type, document_name, file_path, upload_date, description, checksum)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            new.student_id,
            new.document_type.as_str(),
            new.name.trim(),
            file_path,
            upload_date,
            new.description.as_deref().filter(|d| !d.is_empty()),
            checksum,
        ],
    )?;
    let id = conn.last_insert_rowid();

    record_event(
        conn,
        "document_added",
        "document",
        id,
        serde_json::json!({
            "student_id": new.student_id,
            "type": new.document_type.as_str(),
            "checksum": checksum,
        }),
    );
    info!(document_id = id, student_id = new.student_id, "document added");
    Ok(id)
}

/// Newest upload first
pub fn get_student_documents(conn: &Connection, student_id: i64) -> RecordsResult<Vec<Document>> {
    let mut stmt = conn.prepare(
        "SELECT document_id, student_id, document_type, document_name, file_path,
                upload_date, description, checksum
         FROM documents
         WHERE student_id = ?1
         ORDER BY upload_date DESC, document_id DESC",
    )?;

    let docs = stmt
        .query_map([student_id], |row| {
            Ok(Document {
                id: row.get("document_id")?,
                student_id: row.get("student_id")?,
                document_type: row.get("document_type")?,
                name: row.get("document_name")?,
                file_path: row.get("file_path")?,
                upload_date: row.get("upload_date")?,
                description: row.get("description")?,
                checksum: row.get("checksum")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(docs)
}

pub fn delete_document(conn: &Connection, id: i64) -> RecordsResult<bool> {
    let changed = conn.execute("DELETE FROM documents WHERE document_id = ?1", [id])?;
    if changed > 0 {
        record_event(conn, "document_deleted", "document", id, serde_json::json!({}));
        info!(document_id = id, "document deleted");
    }
    Ok(changed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::{student, NewStudent};

    fn seeded_db() -> (Connection, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let sid = student::add_student(
            &conn,
            &NewStudent {
                first_name: "Grace".to_string(),
                last_name: "Hopper".to_string(),
                email: "grace@example.com".to_string(),
                phone: None,
                date_of_birth: None,
            },
        )
        .unwrap();
        (conn, sid)
    }

    fn new_doc(student_id: i64, name: &str, date: &str, path: Option<String>) -> NewDocument {
        NewDocument {
            student_id,
            document_type: DocumentType::Certificate,
            name: name.to_string(),
            file_path: path,
            description: None,
            upload_date: Some(date.to_string()),
        }
    }

    #[test]
    fn test_checksum_recorded_when_file_exists() {
        let (conn, sid) = seeded_db();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cert.pdf");
        std::fs::write(&path, b"abc").unwrap();

        add_document(
            &conn,
            &new_doc(sid, "Cert", "2024-01-10", Some(path.display().to_string())),
        )
        .unwrap();
        add_document(
            &conn,
            &new_doc(sid, "Missing", "2024-02-10", Some("/no/such/file".to_string())),
        )
        .unwrap();

        let docs = get_student_documents(&conn, sid).unwrap();
        assert_eq!(docs.len(), 2);
        // Newest first
        assert_eq!(docs[0].name, "Missing");
        assert_eq!(docs[0].checksum, None);
        assert_eq!(
            docs[1].checksum.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn test_document_type_choices() {
        assert_eq!(DocumentType::from_choice("3"), DocumentType::IdCard);
        assert_eq!(DocumentType::from_choice("0"), DocumentType::Other);
        assert_eq!(DocumentType::from_choice("x"), DocumentType::Other);
        assert_eq!(DocumentType::parse("medical record"), Some(DocumentType::MedicalRecord));
        assert_eq!(DocumentType::parse("Passport"), None);
    }

    #[test]
    fn test_delete_document_and_cascade() {
        let (conn, sid) = seeded_db();
        let id = add_document(&conn, &new_doc(sid, "Cert", "2024-01-10", None)).unwrap();
        add_document(&conn, &new_doc(sid, "Other", "2024-01-11", None)).unwrap();

        assert!(delete_document(&conn, id).unwrap());
        assert!(!delete_document(&conn, id).unwrap());

        student::delete_student(&conn, sid).unwrap();
        assert!(get_student_documents(&conn, sid).unwrap().is_empty());
    }

    #[test]
    fn test_blank_name_rejected() {
        let (conn, sid) = seeded_db();
        assert!(add_document(&conn, &new_doc(sid, "  ", "2024-01-10", None)).is_err());
        assert!(add_document(&conn, &new_doc(sid, "Cert", "10/01/2024", None)).is_err());
    }
}

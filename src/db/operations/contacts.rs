use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{companies, non_blank, CrmError};

pub const STATUSES: &[&str] = &["aktiv", "lead", "inaktiv"];
pub const DEFAULT_STATUS: &str = "aktiv";

const CONTACT_SELECT: &str = r#"
    SELECT
      cc.id::text AS id,
      cc.company_id::text AS company_id,
      c.name AS company_name,
      cc.name,
      cc.position,
      cc.email,
      cc.phone,
      cc.status,
      cc.created_at
    FROM company_contacts cc
    LEFT JOIN companies c ON c.id = cc.company_id
"#;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub name: String,
    pub position: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactDetail {
    #[serde(flatten)]
    pub contact: Contact,
    pub initials: String,
}

impl From<Contact> for ContactDetail {
    fn from(contact: Contact) -> Self {
        let initials = initials(&contact.name);
        Self { contact, initials }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub company_id: Option<String>,
    pub name: String,
    pub position: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
}

/// First letter of the first and last word, upper-cased.
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let picked = match words.as_slice() {
        [] => return "?".to_string(),
        [only] => vec![*only],
        [first, .., last] => vec![*first, *last],
    };
    picked
        .iter()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn normalize_status(status: Option<&str>) -> Result<&'static str, CrmError> {
    let Some(raw) = status.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(DEFAULT_STATUS);
    };
    let lowered = raw.to_lowercase();
    STATUSES
        .iter()
        .copied()
        .find(|candidate| *candidate == lowered)
        .ok_or_else(|| {
            CrmError::Validation(format!("Status must be one of: {}", STATUSES.join(", ")))
        })
}

fn map_contact(row: &PgRow) -> Result<Contact, sqlx::Error> {
    Ok(Contact {
        id: row.try_get("id")?,
        company_id: row.try_get("company_id")?,
        company_name: row.try_get("company_name")?,
        name: row.try_get("name")?,
        position: row.try_get("position")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn list(pool: &PgPool) -> Result<Vec<Contact>, sqlx::Error> {
    let sql = format!("{CONTACT_SELECT} ORDER BY cc.created_at DESC");
    let rows = sqlx::query(&sql).fetch_all(pool).await?;
    rows.iter().map(map_contact).collect()
}

pub async fn list_for_company(pool: &PgPool, company_id: &str) -> Result<Vec<Contact>, sqlx::Error> {
    let sql = format!("{CONTACT_SELECT} WHERE cc.company_id::text = $1 ORDER BY cc.name");
    let rows = sqlx::query(&sql).bind(company_id).fetch_all(pool).await?;
    rows.iter().map(map_contact).collect()
}

pub async fn find(pool: &PgPool, id: &str) -> Result<Option<Contact>, sqlx::Error> {
    let sql = format!("{CONTACT_SELECT} WHERE cc.id::text = $1");
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(map_contact).transpose()
}

pub async fn create(pool: &PgPool, contact: NewContact) -> Result<Contact, CrmError> {
    let name = contact.name.trim().to_string();
    if name.is_empty() {
        return Err(CrmError::Validation("Contact name is required".to_string()));
    }
    let status = normalize_status(contact.status.as_deref())?;

    let company_id = match non_blank(contact.company_id) {
        Some(raw) => {
            let company_not_found = || CrmError::NotFound("Company not found".to_string());
            let parsed = uuid::Uuid::parse_str(&raw).map_err(|_| company_not_found())?;
            let company_id = parsed.to_string();
            if !companies::exists(pool, &company_id).await? {
                return Err(company_not_found());
            }
            Some(company_id)
        }
        None => None,
    };

    let id: String = sqlx::query_scalar(
        r#"
        INSERT INTO company_contacts (company_id, name, position, email, phone, status)
        VALUES ($1::uuid, $2, $3, $4, $5, $6)
        RETURNING id::text
        "#,
    )
    .bind(company_id)
    .bind(&name)
    .bind(non_blank(contact.position))
    .bind(non_blank(contact.email))
    .bind(non_blank(contact.phone))
    .bind(status)
    .fetch_one(pool)
    .await?;

    find(pool, &id)
        .await?
        .ok_or_else(|| CrmError::NotFound("Contact not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials() {
        assert_eq!(initials("Max Mustermann"), "MM");
        assert_eq!(initials("anna maria schmidt"), "AS");
        assert_eq!(initials("Cher"), "C");
        assert_eq!(initials("   "), "?");
        assert_eq!(initials("ßigrid özdemir"), "SSÖ");
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status(None).unwrap(), "aktiv");
        assert_eq!(normalize_status(Some("")).unwrap(), "aktiv");
        assert_eq!(normalize_status(Some("Lead")).unwrap(), "lead");
        assert_eq!(normalize_status(Some(" inaktiv ")).unwrap(), "inaktiv");
        assert!(matches!(
            normalize_status(Some("archived")),
            Err(CrmError::Validation(_))
        ));
    }

    #[test]
    fn test_detail_flattens_contact() {
        let contact = Contact {
            id: "k1".into(),
            company_id: None,
            company_name: None,
            name: "Erika Musterfrau".into(),
            position: Some("CTO".into()),
            email: None,
            phone: None,
            status: "lead".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(ContactDetail::from(contact)).unwrap();
        assert_eq!(json["initials"], "EM");
        assert_eq!(json["name"], "Erika Musterfrau");
        assert_eq!(json["status"], "lead");
        assert!(json["companyId"].is_null());
    }
}

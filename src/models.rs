use chrono::NaiveDateTime;

/// Transaction outcome as recorded in the extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Approved,
    Denied,
    Cancelled,
    Other(String),
}

impl Status {
    pub fn parse(raw: &str) -> Self {
        let s = raw.trim();
        match s.to_lowercase().as_str() {
            "aprovada" | "aprovado" | "approved" => Self::Approved,
            "negada" | "negado" | "recusada" | "denied" => Self::Denied,
            "cancelada" | "cancelado" | "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Approved => "Aprovada",
            Self::Denied => "Negada",
            Self::Cancelled => "Cancelada",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub account: Option<String>,
    pub amount: f64,
    pub raw_date: String,
    /// Filled by the date normalizer; `None` when no strategy could parse `raw_date`.
    pub timestamp: Option<NaiveDateTime>,
    pub status: Status,
    pub kind: Option<String>,
    /// Direct keys, present in extracts that skip the account bridge.
    pub customer_id: Option<String>,
    pub branch_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub number: String,
    pub customer_id: Option<String>,
    pub branch_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Customer {
    pub id: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub kind: Option<String>,
}

impl Customer {
    /// Full name, falling back to first + last name.
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = &self.name {
            return Some(name.clone());
        }
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => Some(format!("{f} {l}")),
            (Some(f), None) => Some(f.clone()),
            (None, Some(l)) => Some(l.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Branch {
    pub code: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_variants() {
        assert_eq!(Status::parse("Aprovada"), Status::Approved);
        assert_eq!(Status::parse(" approved "), Status::Approved);
        assert_eq!(Status::parse("Negada"), Status::Denied);
        assert_eq!(Status::parse("Cancelled"), Status::Cancelled);
        assert_eq!(Status::parse("Em análise"), Status::Other("Em análise".to_string()));
    }

    #[test]
    fn test_status_label() {
        assert_eq!(Status::Approved.label(), "Aprovada");
        assert_eq!(Status::Other("Pendente".to_string()).label(), "Pendente");
        assert!(Status::Approved.is_approved());
        assert!(!Status::Denied.is_approved());
    }

    #[test]
    fn test_customer_display_name() {
        let mut c = Customer {
            id: "1".to_string(),
            name: None,
            first_name: Some("Ana".to_string()),
            last_name: Some("Souza".to_string()),
            address: None,
            city: None,
            kind: None,
        };
        assert_eq!(c.display_name().as_deref(), Some("Ana Souza"));
        c.name = Some("Ana P. Souza".to_string());
        assert_eq!(c.display_name().as_deref(), Some("Ana P. Souza"));
    }
}

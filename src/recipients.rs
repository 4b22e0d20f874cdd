use crate::config::RecipientConfig;
use crate::errors::AppError;
use crate::models::LeaderRecord;
use std::collections::HashSet;

pub const DEFAULT_GENERAL_RECIPIENT: &str = "Líder Merchan";
pub const DEFAULT_EXECUTIVE_RECIPIENT: &str = "Diretoria";

/// Which report a directory row is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderClass {
    General,
    Executive,
    Area,
}

/// Classifies a leader by the trimmed, case-insensitive area label.
pub fn classify(area_label: &str) -> LeaderClass {
    match area_label.trim().to_lowercase().as_str() {
        "merchan" => LeaderClass::General,
        "diretoria" => LeaderClass::Executive,
        _ => LeaderClass::Area,
    }
}

/// Directory rows split by class, in directory order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeaderPartition {
    pub general: Vec<LeaderRecord>,
    pub executive: Vec<LeaderRecord>,
    /// One entry per leader name; the first row seen for a name wins.
    pub area: Vec<LeaderRecord>,
}

impl LeaderPartition {
    pub fn is_empty(&self) -> bool {
        self.general.is_empty() && self.executive.is_empty() && self.area.is_empty()
    }
}

pub fn partition_leaders(rows: Vec<LeaderRecord>) -> LeaderPartition {
    let mut partition = LeaderPartition::default();
    let mut seen_area_leaders: HashSet<String> = HashSet::new();

    for row in rows {
        match classify(&row.area) {
            LeaderClass::General => partition.general.push(row),
            LeaderClass::Executive => partition.executive.push(row),
            LeaderClass::Area => {
                if row.name.trim().is_empty() {
                    tracing::debug!("Skipping area leader without a name ({})", row.area);
                    continue;
                }
                if seen_area_leaders.insert(row.name.trim().to_string()) {
                    partition.area.push(row);
                }
            }
        }
    }

    partition
}

/// Display name for a general or executive recipient.
pub fn recipient_name(leader: &LeaderRecord, class: LeaderClass) -> String {
    let name = leader.name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    match class {
        LeaderClass::Executive => DEFAULT_EXECUTIVE_RECIPIENT.to_string(),
        _ => DEFAULT_GENERAL_RECIPIENT.to_string(),
    }
}

/// Normalizes a stored phone into an E.164-like string.
///
/// Best effort: the result is not guaranteed to be a dialable number. Numbers that
/// fail validation are logged and returned anyway.
pub fn normalize_phone_to_e164(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')' | '.'))
        .collect();

    if stripped.is_empty() {
        return String::new();
    }

    let normalized = if stripped.starts_with('+') {
        stripped
    } else {
        let digits: String = stripped.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return String::new();
        }
        if digits.starts_with("55") {
            format!("+{}", digits)
        } else if digits.len() == 10 || digits.len() == 11 {
            format!("+55{}", digits)
        } else {
            format!("+{}", digits)
        }
    };

    match phonenumber::parse(None, &normalized) {
        Ok(number) if phonenumber::is_valid(&number) => {
            tracing::debug!("✓ Valid phone: {} → {}", raw, normalized);
        }
        Ok(_) => tracing::warn!("⚠ Phone does not look valid: {} → {}", raw, normalized),
        Err(e) => tracing::warn!("⚠ Failed to parse phone '{}': {:?}", raw, e),
    }

    normalized
}

/// Turns stored phones into destination phones, honoring the test-phone override.
#[derive(Debug, Clone)]
pub struct RecipientResolver {
    override_phone: Option<String>,
}

impl RecipientResolver {
    /// Fails when the override is on but the test phone normalizes to nothing.
    pub fn new(config: &RecipientConfig) -> Result<Self, AppError> {
        if !config.use_test_phone {
            return Ok(Self {
                override_phone: None,
            });
        }

        let phone = config
            .test_phone_e164
            .as_deref()
            .map(normalize_phone_to_e164)
            .unwrap_or_default();
        if !phone.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::ConfigError(
                "USE_TEST_PHONE is enabled but TEST_PHONE_E164 has no usable digits".to_string(),
            ));
        }

        Ok(Self {
            override_phone: Some(phone),
        })
    }

    pub fn is_overriding(&self) -> bool {
        self.override_phone.is_some()
    }

    pub fn resolve_phone(&self, raw: &str) -> String {
        match &self.override_phone {
            Some(phone) => phone.clone(),
            None => normalize_phone_to_e164(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader(name: &str, area: &str, phone: &str) -> LeaderRecord {
        LeaderRecord {
            name: name.to_string(),
            area: area.to_string(),
            raw_phone: phone.to_string(),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(" MERCHAN "), LeaderClass::General);
        assert_eq!(classify("Diretoria"), LeaderClass::Executive);
        assert_eq!(classify("Filial"), LeaderClass::Area);
        assert_eq!(classify("merchan norte"), LeaderClass::Area);
    }

    #[test]
    fn test_partition_dedups_area_leaders() {
        let rows = vec![
            leader("Ana", "Filial", "1"),
            leader("Ana", "Trad", "2"),
            leader("", "Trad", "3"),
            leader("Bruno", "merchan", "4"),
            leader("Bruno", "Merchan", "5"),
            leader("Carla", "diretoria", "6"),
        ];

        let partition = partition_leaders(rows);
        assert_eq!(partition.area, vec![leader("Ana", "Filial", "1")]);
        assert_eq!(partition.general.len(), 2);
        assert_eq!(partition.executive.len(), 1);
    }

    #[test]
    fn test_recipient_name_defaults() {
        let anonymous = leader("  ", "merchan", "");
        assert_eq!(recipient_name(&anonymous, LeaderClass::General), "Líder Merchan");
        assert_eq!(recipient_name(&anonymous, LeaderClass::Executive), "Diretoria");
        assert_eq!(recipient_name(&leader("Ana", "x", ""), LeaderClass::General), "Ana");
    }

    #[test]
    fn test_normalize_phone_rules() {
        assert_eq!(normalize_phone_to_e164("85986068742"), "+5585986068742");
        assert_eq!(normalize_phone_to_e164("+1 555-0100"), "+15550100");
        assert_eq!(normalize_phone_to_e164(""), "");
        assert_eq!(normalize_phone_to_e164("(85) 3333-4444"), "+558533334444");
        assert_eq!(normalize_phone_to_e164("55 85 98606-8742"), "+5585986068742");
        assert_eq!(normalize_phone_to_e164("123"), "+123");
        assert_eq!(normalize_phone_to_e164("sem telefone"), "");
    }

    #[test]
    fn test_resolver_override() {
        let resolver = RecipientResolver::new(&RecipientConfig {
            use_test_phone: true,
            test_phone_e164: Some("+55 85 99999-0000".to_string()),
        })
        .unwrap();
        assert!(resolver.is_overriding());
        assert_eq!(resolver.resolve_phone("11987654321"), "+5585999990000");

        let resolver = RecipientResolver::new(&RecipientConfig {
            use_test_phone: false,
            test_phone_e164: Some("+5585999990000".to_string()),
        })
        .unwrap();
        assert!(!resolver.is_overriding());
        assert_eq!(resolver.resolve_phone("11987654321"), "+5511987654321");
    }

    #[test]
    fn test_resolver_rejects_test_phone_without_digits() {
        for bad in [Some("n/a"), Some(" - "), Some("+x"), None] {
            let result = RecipientResolver::new(&RecipientConfig {
                use_test_phone: true,
                test_phone_e164: bad.map(str::to_string),
            });
            assert!(
                matches!(result, Err(AppError::ConfigError(_))),
                "test phone {:?} must not fall back to real phones",
                bad
            );
        }

        // Override off: the unusable test phone is never consulted
        let resolver = RecipientResolver::new(&RecipientConfig {
            use_test_phone: false,
            test_phone_e164: Some("n/a".to_string()),
        })
        .unwrap();
        assert_eq!(resolver.resolve_phone("85986068742"), "+5585986068742");
    }
}

use std::collections::{BTreeSet, HashMap, HashSet};

use metris_client::domain::DbSite;

use crate::sources::SiteRecord;

/// A site present in both the directory and the database, carrying
/// everything the calculator and executor need.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedSite {
    pub site_id: String,
    pub site_name: String,
    pub commission_date: Option<String>,
    pub annual_generation: f64,
}

/// Result of joining the directory against the database on the natural key.
///
/// `matched`, `in_source_not_db` and `in_source_not_authoritative` form a
/// disjoint partition of the deduplicated directory key set. Key lists are
/// sorted for deterministic reports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub matched: Vec<MatchedSite>,
    pub in_source_not_db: Vec<String>,
    pub in_db_not_source: Vec<String>,
    pub in_source_not_authoritative: Vec<String>,
}

/// Match directory records to database sites by exact, case-sensitive key
/// equality.
///
/// When an authoritative allow-list is supplied, records absent from it are
/// excluded from matching and reported in `in_source_not_authoritative`.
pub fn match_sites(
    records: &[SiteRecord],
    db_sites: &[DbSite],
    authoritative: Option<&[String]>,
) -> ReconcileOutcome {
    let db_by_name: HashMap<&str, &str> = db_sites
        .iter()
        .map(|s| (s.name.as_str(), s.id.as_str()))
        .collect();
    let allow: Option<HashSet<&str>> =
        authoritative.map(|names| names.iter().map(String::as_str).collect());

    let mut outcome = ReconcileOutcome::default();
    let mut filtered_keys: BTreeSet<&str> = BTreeSet::new();

    for record in records {
        let key = record.sto_number.as_str();
        if let Some(allow) = &allow {
            if !allow.contains(key) {
                outcome.in_source_not_authoritative.push(key.to_string());
                continue;
            }
        }
        filtered_keys.insert(key);
        match db_by_name.get(key) {
            Some(id) => outcome.matched.push(MatchedSite {
                site_id: (*id).to_string(),
                site_name: key.to_string(),
                commission_date: record.commission_date.clone(),
                annual_generation: record.annual_generation,
            }),
            None => outcome.in_source_not_db.push(key.to_string()),
        }
    }

    // The drift check runs against the post-filter key set on purpose: a db
    // site whose directory row was excluded by the allow-list still counts
    // as missing from the source.
    outcome.in_db_not_source = db_sites
        .iter()
        .filter(|s| !filtered_keys.contains(s.name.as_str()))
        .map(|s| s.name.clone())
        .collect();

    outcome.in_source_not_db.sort();
    outcome.in_db_not_source.sort();
    outcome.in_source_not_authoritative.sort();

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, generation: f64) -> SiteRecord {
        SiteRecord {
            sto_number: key.to_string(),
            commission_date: Some("2021-01-01".to_string()),
            annual_generation: generation,
        }
    }

    fn db_site(name: &str) -> DbSite {
        DbSite {
            id: format!("id-{name}"),
            name: name.to_string(),
        }
    }

    #[test]
    fn matches_on_exact_key_and_carries_attributes() {
        let records = vec![record("A", 1000.0), record("B", 2000.0)];
        let db = vec![db_site("B")];

        let outcome = match_sites(&records, &db, None);

        assert_eq!(outcome.matched.len(), 1);
        let m = &outcome.matched[0];
        assert_eq!(m.site_id, "id-B");
        assert_eq!(m.site_name, "B");
        assert_eq!(m.annual_generation, 2000.0);
        assert_eq!(outcome.in_source_not_db, vec!["A".to_string()]);
        assert_eq!(outcome.in_db_not_source, Vec::<String>::new());
        assert!(outcome.in_source_not_authoritative.is_empty());
    }

    #[test]
    fn key_matching_is_case_sensitive() {
        let records = vec![record("sto-1", 500.0)];
        let db = vec![db_site("STO-1")];

        let outcome = match_sites(&records, &db, None);

        assert!(outcome.matched.is_empty());
        assert_eq!(outcome.in_source_not_db, vec!["sto-1".to_string()]);
        assert_eq!(outcome.in_db_not_source, vec!["STO-1".to_string()]);
    }

    #[test]
    fn allow_list_excludes_before_matching() {
        // Source {A,B,C}, db {B,C,D}, allow-list {A,B}.
        let records = vec![record("A", 1.0), record("B", 2.0), record("C", 3.0)];
        let db = vec![db_site("B"), db_site("C"), db_site("D")];
        let allow = vec!["A".to_string(), "B".to_string()];

        let outcome = match_sites(&records, &db, Some(&allow));

        assert_eq!(outcome.matched.len(), 1);
        assert_eq!(outcome.matched[0].site_name, "B");
        // A passed the filter but has no db counterpart.
        assert_eq!(outcome.in_source_not_db, vec!["A".to_string()]);
        // C was filtered out before matching, so it is reported here and the
        // drift check below treats it as missing from the source.
        assert_eq!(outcome.in_source_not_authoritative, vec!["C".to_string()]);
        assert_eq!(
            outcome.in_db_not_source,
            vec!["C".to_string(), "D".to_string()]
        );
    }

    #[test]
    fn outcome_partitions_the_source_key_set() {
        let records = vec![
            record("A", 1.0),
            record("B", 2.0),
            record("C", 3.0),
            record("E", 5.0),
        ];
        let db = vec![db_site("B"), db_site("C"), db_site("D")];
        let allow = vec!["A".to_string(), "B".to_string(), "C".to_string()];

        let outcome = match_sites(&records, &db, Some(&allow));

        let mut all: Vec<String> = outcome
            .matched
            .iter()
            .map(|m| m.site_name.clone())
            .chain(outcome.in_source_not_db.iter().cloned())
            .chain(outcome.in_source_not_authoritative.iter().cloned())
            .collect();
        all.sort();
        assert_eq!(all, vec!["A", "B", "C", "E"]);

        let unique: BTreeSet<&String> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
        assert!(outcome.matched.len() <= db.len().min(records.len()));
    }
}

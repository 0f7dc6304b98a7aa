//! SQL text for one task table.
//!
//! Identifiers come from a validated `TaskTable` and are double-quoted on top
//! of that. Values are always bound. Every timestamp is the database's
//! `now()` so workers with skewed clocks agree on lease expiry.

use quill_core::domain::TaskTable;

/// `content.questions` -> `"content"."questions"`
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    /// $1 = lease in seconds (float8)
    pub sweep: String,
    /// $1 = limit
    pub select_candidates: String,
    /// $1 = owner, $2 = candidate ids, $3 = limit
    pub claim: String,
    /// $1 = id, $2 = owner, $3 = result
    pub complete: String,
    /// $1 = id, $2 = owner
    pub release: String,
    pub stats: String,
}

impl Statements {
    pub fn new(table: &TaskTable) -> Self {
        let t = quote_ident(&table.table);
        let id = quote_ident(&table.id_column);
        let result = quote_ident(&table.result_column);
        let owner = quote_ident(&table.owner_column);
        let at = quote_ident(&table.claimed_at_column);
        let filter = table
            .filter
            .as_deref()
            .map(|f| format!(" AND ({f})"))
            .unwrap_or_default();

        let payload = table
            .payload_columns
            .iter()
            .map(|c| format!("'{c}', {}", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            sweep: format!(
                "UPDATE {t} SET {owner} = NULL, {at} = NULL \
                 WHERE {result} IS NULL AND {owner} IS NOT NULL \
                 AND ({at} IS NULL OR {at} < now() - make_interval(secs => $1)){filter}"
            ),
            select_candidates: format!(
                "SELECT {id} FROM {t} \
                 WHERE {result} IS NULL AND {owner} IS NULL{filter} \
                 ORDER BY {id} LIMIT $1"
            ),
            claim: format!(
                "UPDATE {t} SET {owner} = $1, {at} = now() \
                 WHERE {id} IN (\
                 SELECT {id} FROM {t} \
                 WHERE {id} = ANY($2) AND {result} IS NULL AND {owner} IS NULL{filter} \
                 ORDER BY {id} LIMIT $3) \
                 AND {result} IS NULL AND {owner} IS NULL \
                 RETURNING {id} AS id, jsonb_build_object({payload}) AS payload, \
                 {owner} AS owner, {at} AS claimed_at"
            ),
            complete: format!(
                "UPDATE {t} SET {result} = $3, {owner} = NULL, {at} = NULL \
                 WHERE {id} = $1 AND {owner} = $2 AND {result} IS NULL"
            ),
            release: format!(
                "UPDATE {t} SET {owner} = NULL, {at} = NULL \
                 WHERE {id} = $1 AND {owner} = $2 AND {result} IS NULL"
            ),
            stats: format!(
                "SELECT \
                 count(*) FILTER (WHERE {result} IS NULL AND {owner} IS NULL) AS pending, \
                 count(*) FILTER (WHERE {result} IS NULL AND {owner} IS NOT NULL) AS claimed, \
                 count(*) FILTER (WHERE {result} IS NOT NULL) AS done \
                 FROM {t} WHERE TRUE{filter}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn questions() -> TaskTable {
        TaskTable::new("content.questions", &["question", "choices"], "subject")
    }

    #[rstest]
    #[case("questions", "\"questions\"")]
    #[case("content.questions", "\"content\".\"questions\"")]
    fn quotes_identifiers(#[case] raw: &str, #[case] quoted: &str) {
        assert_eq!(quote_ident(raw), quoted);
    }

    #[test]
    fn claim_is_one_conditional_update() {
        let sql = Statements::new(&questions()).claim;

        assert!(sql.starts_with("UPDATE \"content\".\"questions\" SET \"locked_by\" = $1, \"locked_at\" = now()"));
        assert!(sql.contains("\"id\" = ANY($2)"));
        assert!(sql.contains("ORDER BY \"id\" LIMIT $3"));
        // the outer predicate repeats the condition so a lost race updates nothing
        assert!(sql.contains(") AND \"subject\" IS NULL AND \"locked_by\" IS NULL RETURNING"));
        assert!(sql.contains("jsonb_build_object('question', \"question\", 'choices', \"choices\")"));
    }

    #[test]
    fn writes_are_scoped_to_current_owner() {
        let statements = Statements::new(&questions());
        for sql in [&statements.complete, &statements.release] {
            assert!(sql.contains("WHERE \"id\" = $1 AND \"locked_by\" = $2 AND \"subject\" IS NULL"));
        }
        assert!(statements.complete.contains("SET \"subject\" = $3, \"locked_by\" = NULL, \"locked_at\" = NULL"));
        assert!(!statements.release.contains("\"subject\" ="));
    }

    #[test]
    fn sweep_uses_database_clock() {
        let sql = Statements::new(&questions()).sweep;
        assert!(sql.contains("\"locked_at\" < now() - make_interval(secs => $1)"));
        assert!(sql.contains("\"subject\" IS NULL AND \"locked_by\" IS NOT NULL"));
    }

    #[test]
    fn filter_is_applied_to_reads_and_claims() {
        let table = questions().with_filter("language = 'en'");
        let statements = Statements::new(&table);

        assert!(statements.select_candidates.contains("IS NULL AND (language = 'en') ORDER BY"));
        assert!(statements.claim.contains("IS NULL AND (language = 'en') ORDER BY"));
        assert!(statements.stats.ends_with("WHERE TRUE AND (language = 'en')"));
        assert!(statements.sweep.ends_with(" AND (language = 'en')"));
    }
}

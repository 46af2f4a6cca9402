//! # GraphQL Index Adapter
//!
//! `AtomIndex` over the index's GraphQL HTTP endpoint. Each call POSTs
//! `{query, variables}` and maps the JSON answer into core types.

use super::{AtomIndex, IndexError, IndexFuture};
use atomlens_core::{AtomMatch, AtomSummary, Creator, Stake, Triple, VaultAggregate};
use futures::FutureExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

// =============================================================================
// QUERY DOCUMENTS
// =============================================================================

const ATOM_FIELDS: &str = r"
    term_id
    label
    data
    created_at
    creator { id label }
    vaults(order_by: { curve_id: asc }) { term_id curve_id total_shares position_count }
";

const TRIPLE_FIELDS: &str = r"
    term_id
    subject { term_id label data }
    predicate { term_id label data }
    object { term_id label data }
    vaults(order_by: { curve_id: asc }, limit: 1) { total_shares }
";

/// Case-insensitive match on the label or the raw data. `$label` carries no
/// wildcards, so `_ilike` compares whole values.
fn atoms_by_label_query() -> String {
    format!(
        "query AtomsByLabel($label: String!) {{ atoms(where: {{ _or: [{{ label: {{ _ilike: $label }} }}, {{ data: {{ _ilike: $label }} }}] }}, limit: 20) {{ {ATOM_FIELDS} }} }}"
    )
}

/// Substring match over the label, the raw data, and the name and
/// description of structured thing, person and organization values.
fn atoms_partial_query() -> String {
    let mut branches = vec![
        "{ label: { _ilike: $pattern } }".to_string(),
        "{ data: { _ilike: $pattern } }".to_string(),
    ];
    for kind in ["thing", "person", "organization"] {
        for field in ["name", "description"] {
            branches.push(format!(
                "{{ value: {{ {kind}: {{ {field}: {{ _ilike: $pattern }} }} }} }}"
            ));
        }
    }
    let filter = branches.join(", ");
    format!(
        "query AtomsPartial($pattern: String!) {{ atoms(where: {{ _or: [{filter}] }}, limit: 20, order_by: {{ created_at: desc }}) {{ {ATOM_FIELDS} }} }}"
    )
}

/// Escape the `ILIKE` metacharacters so user text matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

fn triples_containing_query(with_search: bool) -> String {
    let anchor = "{ _or: [{ subject_id: { _eq: $atomId } }, { predicate_id: { _eq: $atomId } }, { object_id: { _eq: $atomId } }] }";
    let (params, filter) = if with_search {
        (
            "$atomId: String!, $limit: Int!, $pattern: String!",
            format!(
                "{{ _and: [{anchor}, {{ _or: [{{ subject: {{ label: {{ _ilike: $pattern }} }} }}, {{ predicate: {{ label: {{ _ilike: $pattern }} }} }}, {{ object: {{ label: {{ _ilike: $pattern }} }} }}] }}] }}"
            ),
        )
    } else {
        ("$atomId: String!, $limit: Int!", anchor.to_string())
    };
    format!(
        "query TriplesContaining({params}) {{ triples(where: {filter}, limit: $limit, order_by: {{ created_at: desc }}) {{ {TRIPLE_FIELDS} }} }}"
    )
}

fn recent_triples_query() -> String {
    format!(
        "query RecentTriples($limit: Int!) {{ triples(limit: $limit, order_by: {{ created_at: desc }}) {{ {TRIPLE_FIELDS} }} }}"
    )
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct AtomsData {
    atoms: Vec<RawAtom>,
}

#[derive(Debug, Deserialize)]
struct TriplesData {
    triples: Vec<RawTriple>,
}

#[derive(Debug, Deserialize)]
struct RawAtom {
    term_id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    creator: Option<RawCreator>,
    #[serde(default)]
    vaults: Vec<RawVault>,
}

#[derive(Debug, Deserialize)]
struct RawCreator {
    id: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVault {
    #[serde(default)]
    term_id: Option<String>,
    #[serde(default)]
    curve_id: Value,
    #[serde(default)]
    total_shares: Value,
    #[serde(default)]
    position_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawAtomRef {
    term_id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTriple {
    term_id: String,
    subject: RawAtomRef,
    predicate: RawAtomRef,
    object: RawAtomRef,
    #[serde(default)]
    vaults: Vec<RawVault>,
}

/// Numeric fields arrive as JSON numbers or as decimal strings.
fn stake_from(value: &Value) -> Stake {
    match value {
        Value::String(s) => s.parse().unwrap_or_else(|e| {
            tracing::debug!(value = %s, error = %e, "treating malformed stake as zero");
            Stake::zero()
        }),
        Value::Number(n) => n.as_u64().map(Stake::from).unwrap_or_default(),
        _ => Stake::zero(),
    }
}

fn u64_from(value: &Value) -> u64 {
    match value {
        Value::String(s) => s.parse().unwrap_or(0),
        Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    }
}

impl RawAtom {
    fn into_match(self) -> AtomMatch {
        let vaults = self
            .vaults
            .into_iter()
            .map(|v| VaultAggregate {
                term_id: v.term_id.unwrap_or_else(|| self.term_id.clone()),
                curve_id: u64_from(&v.curve_id),
                total_shares: stake_from(&v.total_shares),
                position_count: v.position_count.unwrap_or(0),
            })
            .collect();
        let creator = self.creator.map(|c| Creator {
            label: c.label.unwrap_or_else(|| c.id.clone()),
            id: c.id,
        });
        AtomMatch::from_vaults(
            self.term_id,
            self.label.unwrap_or_default(),
            self.data.unwrap_or_default(),
            self.created_at.unwrap_or_default(),
            creator,
            vaults,
        )
    }
}

impl From<RawAtomRef> for AtomSummary {
    fn from(raw: RawAtomRef) -> Self {
        AtomSummary::new(
            raw.term_id,
            raw.label.unwrap_or_default(),
            raw.data.unwrap_or_default(),
        )
    }
}

impl From<RawTriple> for Triple {
    fn from(raw: RawTriple) -> Self {
        let stake = raw
            .vaults
            .first()
            .map(|v| stake_from(&v.total_shares))
            .unwrap_or_default();
        Triple {
            term_id: raw.term_id,
            subject: raw.subject.into(),
            predicate: raw.predicate.into(),
            object: raw.object.into(),
            stake,
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// GraphQL-over-HTTP atom index.
#[derive(Debug, Clone)]
pub struct GraphqlAtomIndex {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GraphqlAtomIndex {
    /// Create a client for `endpoint` with a per-request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        api_key: Option<String>,
    ) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexError::Connection(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one GraphQL document and decode its `data`.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: String,
        variables: Value,
    ) -> Result<T, IndexError> {
        let mut req = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| IndexError::Connection(format!("{}: {e}", self.endpoint)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GraphqlResponse<T> = resp
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;

        if !body.errors.is_empty() {
            let messages: Vec<String> = body.errors.into_iter().map(|e| e.message).collect();
            return Err(IndexError::GraphQl(messages.join("; ")));
        }
        body.data
            .ok_or_else(|| IndexError::Decode("response has no data".to_string()))
    }

    async fn atoms(&self, query: String, variables: Value) -> Result<Vec<AtomMatch>, IndexError> {
        let data: AtomsData = self.execute(query, variables).await?;
        Ok(data.atoms.into_iter().map(RawAtom::into_match).collect())
    }

    async fn triples(&self, query: String, variables: Value) -> Result<Vec<Triple>, IndexError> {
        let data: TriplesData = self.execute(query, variables).await?;
        Ok(data.triples.into_iter().map(Triple::from).collect())
    }
}

impl AtomIndex for GraphqlAtomIndex {
    fn search_by_label<'a>(&'a self, label: &'a str) -> IndexFuture<'a, Vec<AtomMatch>> {
        self.atoms(atoms_by_label_query(), json!({ "label": escape_like(label) }))
            .boxed()
    }

    fn search_partial<'a>(&'a self, term: &'a str) -> IndexFuture<'a, Vec<AtomMatch>> {
        self.atoms(atoms_partial_query(), json!({ "pattern": contains_pattern(term) }))
            .boxed()
    }

    fn relationships_containing<'a>(
        &'a self,
        atom_id: &'a str,
        limit: u32,
        search: Option<&'a str>,
    ) -> IndexFuture<'a, Vec<Triple>> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        let (query, variables) = match search {
            Some(s) => (
                triples_containing_query(true),
                json!({ "atomId": atom_id, "limit": limit, "pattern": contains_pattern(s) }),
            ),
            None => (
                triples_containing_query(false),
                json!({ "atomId": atom_id, "limit": limit }),
            ),
        };
        self.triples(query, variables).boxed()
    }

    fn most_frequent_by_slot(&self, limit: u32) -> IndexFuture<'_, Vec<Triple>> {
        self.triples(recent_triples_query(), json!({ "limit": limit }))
            .boxed()
    }
}

// =============================================================================
// TESTS
// =============================================================================

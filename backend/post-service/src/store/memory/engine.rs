//! Pipeline interpreter for the in-process store
//!
//! Stages are evaluated with MongoDB semantics for the subset the service
//! uses: `$count` over no input yields no document, `$unwind` drops rows
//! whose value is missing or an empty array, equality matches elements of
//! array fields, numeric comparisons ignore the integer width and ordering
//! between different types follows the BSON type order.
use std::cmp::Ordering;
use std::collections::HashMap;

use bson::{Bson, Document};

use crate::pipeline::{Accumulator, Expr, FieldPath, Filter, Group, Lookup, SortOrder, Stage};
use crate::projection::engagement::viewer_engaged;
use crate::store::{Collection, StoreError, StoreResult};

pub(super) type Tables = HashMap<Collection, Vec<Document>>;

/// Run `stages` over `rows`, resolving joins against `tables`.
pub(super) fn execute(
    stages: &[Stage],
    mut rows: Vec<Document>,
    tables: &Tables,
) -> StoreResult<Vec<Document>> {
    for stage in stages {
        rows = apply(stage, rows, tables)?;
    }
    Ok(rows)
}

fn apply(stage: &Stage, rows: Vec<Document>, tables: &Tables) -> StoreResult<Vec<Document>> {
    match stage {
        Stage::Match(filter) => Ok(rows.into_iter().filter(|d| matches(filter, d)).collect()),
        Stage::Sort(keys) => {
            let mut rows = rows;
            rows.sort_by(|a, b| {
                keys.iter()
                    .map(|(path, order)| {
                        let ord = compare_values(resolve(a, path).as_ref(), resolve(b, path).as_ref());
                        match order {
                            SortOrder::Ascending => ord,
                            SortOrder::Descending => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
            Ok(rows)
        }
        Stage::Skip(n) => Ok(rows.into_iter().skip(to_usize(*n)).collect()),
        Stage::Limit(n) => Ok(rows.into_iter().take(to_usize(*n)).collect()),
        Stage::Count(name) => {
            if rows.is_empty() {
                return Ok(Vec::new());
            }
            let mut out = Document::new();
            out.insert(name.as_str(), count_value(rows.len()));
            Ok(vec![out])
        }
        Stage::Lookup(lookup) => Ok(rows.into_iter().map(|row| join(lookup, row, tables)).collect()),
        Stage::Unwind(path) => Ok(unwind(path, rows)),
        Stage::AddFields(fields) => rows
            .into_iter()
            .map(|mut row| {
                for (name, expr) in fields {
                    match evaluate(expr, &row)? {
                        Some(value) => {
                            row.insert(name.as_str(), value);
                        }
                        None => {
                            row.remove(name);
                        }
                    }
                }
                Ok(row)
            })
            .collect(),
        Stage::Project(fields) => rows
            .into_iter()
            .map(|row| {
                let mut out = Document::new();
                if !fields.iter().any(|(name, _)| name == "_id") {
                    if let Some(id) = row.get("_id") {
                        out.insert("_id", id.clone());
                    }
                }
                for (name, expr) in fields {
                    if let Some(value) = evaluate(expr, &row)? {
                        out.insert(name.as_str(), value);
                    }
                }
                Ok(out)
            })
            .collect(),
        Stage::Facet(branches) => {
            let mut out = Document::new();
            for (name, stages) in branches {
                let result = execute(stages, rows.clone(), tables)?;
                out.insert(
                    name.as_str(),
                    result.into_iter().map(Bson::Document).collect::<Vec<_>>(),
                );
            }
            Ok(vec![out])
        }
        Stage::Group(group) => Ok(group_rows(group, rows)),
    }
}

/// Filter evaluation shared with `find_one` and deletes.
pub(super) fn matches(filter: &Filter, doc: &Document) -> bool {
    match filter {
        Filter::Always => true,
        Filter::Eq(path, expected) => field_matches(doc, path, |v| values_equal(v, expected)),
        Filter::In(path, candidates) => field_matches(doc, path, |v| {
            candidates.iter().any(|candidate| values_equal(v, candidate))
        }),
        Filter::Gte(path, bound) => field_matches(doc, path, |v| {
            same_type_class(v, bound) && compare_values(Some(v), Some(bound)) != Ordering::Less
        }),
        Filter::Exists(path, expected) => resolve(doc, path).is_some() == *expected,
        Filter::And(filters) => filters.iter().all(|f| matches(f, doc)),
        Filter::Or(filters) => filters.iter().any(|f| matches(f, doc)),
    }
}

fn field_matches(doc: &Document, path: &FieldPath, predicate: impl Fn(&Bson) -> bool) -> bool {
    match resolve(doc, path) {
        Some(Bson::Array(items)) => {
            items.iter().any(&predicate) || predicate(&Bson::Array(items))
        }
        Some(value) => predicate(&value),
        None => false,
    }
}

/// Resolve a dotted path. Numeric segments index arrays; other segments
/// applied to an array collect the field from every embedded document.
pub(super) fn resolve(doc: &Document, path: &FieldPath) -> Option<Bson> {
    let mut segments = path.segments();
    let first = segments.next()?;
    let mut current = doc.get(first)?.clone();

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?.clone(),
            Bson::Array(items) => match segment.parse::<usize>() {
                Ok(index) => items.into_iter().nth(index)?,
                Err(_) => Bson::Array(
                    items
                        .into_iter()
                        .filter_map(|item| match item {
                            Bson::Document(inner) => inner.get(segment).cloned(),
                            _ => None,
                        })
                        .collect(),
                ),
            },
            _ => return None,
        };
    }

    Some(current)
}

fn set_path(doc: &mut Document, path: &FieldPath, value: Bson) {
    let segments: Vec<&str> = path.segments().collect();
    set_segments(doc, &segments, value);
}

fn set_segments(doc: &mut Document, segments: &[&str], value: Bson) {
    match segments {
        [] => {}
        [last] => {
            doc.insert(*last, value);
        }
        [head, rest @ ..] => {
            if !matches!(doc.get(*head), Some(Bson::Document(_))) {
                doc.insert(*head, Document::new());
            }
            if let Some(Bson::Document(inner)) = doc.get_mut(*head) {
                set_segments(inner, rest, value);
            }
        }
    }
}

fn join(lookup: &Lookup, mut row: Document, tables: &Tables) -> Document {
    let local = resolve(&row, &lookup.local_field);
    let joined: Vec<Bson> = tables
        .get(&lookup.from)
        .map(|foreign| {
            foreign
                .iter()
                .filter(|candidate| {
                    let foreign_value = resolve(candidate, &lookup.foreign_field);
                    join_keys_match(local.as_ref(), foreign_value.as_ref())
                })
                .cloned()
                .map(Bson::Document)
                .collect()
        })
        .unwrap_or_default();

    row.insert(lookup.as_field.as_str(), joined);
    row
}

fn join_keys_match(local: Option<&Bson>, foreign: Option<&Bson>) -> bool {
    let local = local.unwrap_or(&Bson::Null);
    let foreign = foreign.unwrap_or(&Bson::Null);

    let locals: Vec<&Bson> = match local {
        Bson::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    let foreigns: Vec<&Bson> = match foreign {
        Bson::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    locals
        .iter()
        .any(|l| foreigns.iter().any(|f| values_equal(l, f)))
}

fn unwind(path: &FieldPath, rows: Vec<Document>) -> Vec<Document> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match resolve(&row, path) {
            None | Some(Bson::Null) => {}
            Some(Bson::Array(items)) => {
                for item in items {
                    let mut copy = row.clone();
                    set_path(&mut copy, path, item);
                    out.push(copy);
                }
            }
            Some(_) => out.push(row),
        }
    }
    out
}

fn evaluate(expr: &Expr, row: &Document) -> StoreResult<Option<Bson>> {
    match expr {
        Expr::Field(path) => Ok(resolve(row, path)),
        Expr::Literal(value) => Ok(Some(value.clone())),
        Expr::Size(path) => match resolve(row, path) {
            Some(Bson::Array(items)) => Ok(Some(count_value(items.len()))),
            other => Err(StoreError::Evaluation(format!(
                "$size requires an array at '{}', found {}",
                path,
                type_name(other.as_ref())
            ))),
        },
        Expr::ViewerIn {
            actions,
            key,
            viewer,
        } => match resolve(row, actions) {
            Some(Bson::Array(items)) => {
                Ok(Some(Bson::Boolean(viewer_engaged(&items, key.as_str(), viewer))))
            }
            other => Err(StoreError::Evaluation(format!(
                "$in requires an array at '{}', found {}",
                actions,
                type_name(other.as_ref())
            ))),
        },
    }
}

fn group_rows(group: &Group, rows: Vec<Document>) -> Vec<Document> {
    let mut keys: Vec<Bson> = Vec::new();
    let mut buckets: Vec<Vec<Document>> = Vec::new();

    for row in rows {
        let key = resolve(&row, &group.key).unwrap_or(Bson::Null);
        match keys.iter().position(|k| values_equal(k, &key)) {
            Some(index) => buckets[index].push(row),
            None => {
                keys.push(key);
                buckets.push(vec![row]);
            }
        }
    }

    keys.into_iter()
        .zip(buckets)
        .map(|(key, members)| {
            let mut out = Document::new();
            out.insert("_id", key);
            for (name, accumulator) in &group.accumulators {
                let value = match accumulator {
                    Accumulator::Count => count_value(members.len()),
                    Accumulator::AddToSet(path) => {
                        let mut set: Vec<Bson> = Vec::new();
                        for member in &members {
                            if let Some(value) = resolve(member, path) {
                                if !set.iter().any(|seen| values_equal(seen, &value)) {
                                    set.push(value);
                                }
                            }
                        }
                        Bson::Array(set)
                    }
                };
                out.insert(name.as_str(), value);
            }
            out
        })
        .collect()
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn same_type_class(a: &Bson, b: &Bson) -> bool {
    type_rank(Some(a)) == type_rank(Some(b))
}

/// BSON comparison order for the types the service stores.
fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null) | Some(Bson::Undefined) => 0,
        Some(Bson::Int32(_)) | Some(Bson::Int64(_)) | Some(Bson::Double(_)) => 1,
        Some(Bson::String(_)) | Some(Bson::Symbol(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::Binary(_)) => 5,
        Some(Bson::ObjectId(_)) => 6,
        Some(Bson::Boolean(_)) => 7,
        Some(Bson::DateTime(_)) => 8,
        Some(Bson::Timestamp(_)) => 9,
        Some(_) => 10,
    }
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Some(x), Some(y)) => match (x, y) {
            (Bson::String(l), Bson::String(r)) => l.cmp(r),
            (Bson::ObjectId(l), Bson::ObjectId(r)) => l.bytes().cmp(&r.bytes()),
            (Bson::Boolean(l), Bson::Boolean(r)) => l.cmp(r),
            (Bson::DateTime(l), Bson::DateTime(r)) => l.cmp(r),
            _ => match (as_f64(x), as_f64(y)) {
                (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        },
        _ => Ordering::Equal,
    }
}

fn count_value(n: usize) -> Bson {
    match i32::try_from(n) {
        Ok(n) => Bson::Int32(n),
        Err(_) => Bson::Int64(i64::try_from(n).unwrap_or(i64::MAX)),
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn type_name(value: Option<&Bson>) -> &'static str {
    match value {
        None => "missing",
        Some(Bson::Null) => "null",
        Some(Bson::Document(_)) => "object",
        Some(Bson::String(_)) => "string",
        Some(_) => "scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fields;
    use bson::doc;

    fn path(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    #[test]
    fn count_over_empty_input_yields_nothing() {
        let rows = execute(&[Stage::Count("total".into())], vec![], &Tables::new()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn unwind_drops_missing_and_empty_arrays() {
        let rows = vec![
            doc! { "n": 1, "tags": ["a", "b"] },
            doc! { "n": 2, "tags": [] },
            doc! { "n": 3 },
        ];
        let out = execute(&[Stage::Unwind(fields::TAGS)], rows, &Tables::new()).unwrap();
        assert_eq!(out, vec![doc! { "n": 1, "tags": "a" }, doc! { "n": 1, "tags": "b" }]);
    }

    #[test]
    fn equality_matches_array_elements() {
        let post = doc! { "tags": ["rust", "mongo"], "userId": "u1" };
        assert!(matches(&Filter::eq(fields::TAGS, "rust"), &post));
        assert!(matches(&Filter::any_of(fields::TAGS, vec!["go", "mongo"]), &post));
        assert!(!matches(&Filter::eq(fields::TAGS, "go"), &post));
        assert!(matches(&Filter::eq(fields::USER_ID, "u1"), &post));
    }

    #[test]
    fn exists_on_first_array_element() {
        let with_media = doc! { "media": [{ "url": "x" }] };
        let without = doc! { "media": [] };
        let filter = Filter::Exists(fields::FIRST_MEDIA, true);
        assert!(matches(&filter, &with_media));
        assert!(!matches(&filter, &without));
    }

    #[test]
    fn gte_compares_within_type_only() {
        let doc = doc! { "n": 5 };
        assert!(matches(&Filter::gte(path("n"), 5i64), &doc));
        assert!(!matches(&Filter::gte(path("n"), 6), &doc));
        assert!(!matches(&Filter::gte(path("n"), "0"), &doc));
    }

    #[test]
    fn size_of_non_array_is_an_error() {
        let stage = Stage::AddFields(vec![("n".into(), Expr::Size(path("missing")))]);
        let err = execute(&[stage], vec![doc! {}], &Tables::new()).unwrap_err();
        assert!(matches!(err, StoreError::Evaluation(_)));
    }

    #[test]
    fn group_counts_and_collects_distinct_values() {
        let rows = vec![
            doc! { "_id": 1, "tags": "a" },
            doc! { "_id": 2, "tags": "a" },
            doc! { "_id": 2, "tags": "b" },
        ];
        let stage = Stage::Group(Group {
            key: fields::TAGS,
            accumulators: vec![
                ("count".into(), Accumulator::Count),
                ("posts".into(), Accumulator::AddToSet(fields::ID)),
            ],
        });
        let out = execute(&[stage], rows, &Tables::new()).unwrap();
        assert_eq!(
            out,
            vec![
                doc! { "_id": "a", "count": 2, "posts": [1, 2] },
                doc! { "_id": "b", "count": 1, "posts": [2] },
            ]
        );
    }
}

use super::filter::Filter;
use super::value::{add_numbers, field_matches, lookup_path, set_path, sort_order};
use mongodb::bson::{doc, Bson, Document};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_i32(self) -> i32 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Include(String),
    /// `$arrayElemAt: [<path>, 0]`
    First { output: String, path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    /// Groups by `key` and sums each `(output, field)` pair.
    Group { key: String, sums: Vec<(String, String)> },
    Lookup { from: String, local_field: String, foreign_field: String, output: String },
    Unwind(String),
    Project { exclude_id: bool, fields: Vec<Projection> },
    Sort(String, SortOrder),
    Limit(i64),
}

/// Declarative aggregation pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matching(mut self, filter: Filter) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn group_sum(mut self, key: &str, sums: &[(&str, &str)]) -> Self {
        self.stages.push(Stage::Group {
            key: key.to_string(),
            sums: sums.iter().map(|(out, field)| (out.to_string(), field.to_string())).collect(),
        });
        self
    }

    pub fn lookup(mut self, from: &str, local_field: &str, foreign_field: &str, output: &str) -> Self {
        self.stages.push(Stage::Lookup {
            from: from.to_string(),
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            output: output.to_string(),
        });
        self
    }

    pub fn unwind(mut self, path: &str) -> Self {
        self.stages.push(Stage::Unwind(path.to_string()));
        self
    }

    pub fn project(mut self, exclude_id: bool, fields: Vec<Projection>) -> Self {
        self.stages.push(Stage::Project { exclude_id, fields });
        self
    }

    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.stages.push(Stage::Sort(field.to_string(), order));
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    pub fn to_documents(&self) -> Vec<Document> {
        self.stages.iter().map(stage_document).collect()
    }

    /// Runs the pipeline over `input`; `collections` backs `$lookup`.
    pub fn evaluate(&self, input: Vec<Document>, collections: &HashMap<String, Vec<Document>>) -> Vec<Document> {
        self.stages
            .iter()
            .fold(input, |docs, stage| evaluate_stage(stage, docs, collections))
    }
}

fn stage_document(stage: &Stage) -> Document {
    match stage {
        Stage::Match(filter) => doc! { "$match": filter.to_document() },
        Stage::Group { key, sums } => {
            let mut group = doc! { "_id": format!("${key}") };
            for (output, field) in sums {
                group.insert(output.clone(), doc! { "$sum": format!("${field}") });
            }
            doc! { "$group": group }
        }
        Stage::Lookup { from, local_field, foreign_field, output } => doc! {
            "$lookup": {
                "from": from.as_str(),
                "localField": local_field.as_str(),
                "foreignField": foreign_field.as_str(),
                "as": output.as_str(),
            }
        },
        Stage::Unwind(path) => doc! { "$unwind": format!("${path}") },
        Stage::Project { exclude_id, fields } => {
            let mut projection = Document::new();
            if *exclude_id {
                projection.insert("_id", 0);
            }
            for field in fields {
                match field {
                    Projection::Include(name) => {
                        projection.insert(name.clone(), 1);
                    }
                    Projection::First { output, path } => {
                        projection.insert(output.clone(), doc! { "$arrayElemAt": [format!("${path}"), 0] });
                    }
                }
            }
            doc! { "$project": projection }
        }
        Stage::Sort(field, order) => doc! { "$sort": { field.as_str(): order.as_i32() } },
        Stage::Limit(n) => doc! { "$limit": *n },
    }
}

fn evaluate_stage(stage: &Stage, docs: Vec<Document>, collections: &HashMap<String, Vec<Document>>) -> Vec<Document> {
    match stage {
        Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
        Stage::Group { key, sums } => group(docs, key, sums),
        Stage::Lookup { from, local_field, foreign_field, output } => {
            let foreign = collections.get(from).map(Vec::as_slice).unwrap_or(&[]);
            docs.into_iter()
                .map(|mut d| {
                    let joined = join(lookup_path(&d, local_field), foreign, foreign_field);
                    set_path(&mut d, output, Bson::Array(joined));
                    d
                })
                .collect()
        }
        Stage::Unwind(path) => docs
            .into_iter()
            .flat_map(|d| match lookup_path(&d, path) {
                Some(Bson::Array(items)) => items
                    .into_iter()
                    .map(|item| {
                        let mut copy = d.clone();
                        set_path(&mut copy, path, item);
                        copy
                    })
                    .collect::<Vec<_>>(),
                Some(Bson::Null) | None => Vec::new(),
                Some(_) => vec![d],
            })
            .collect(),
        Stage::Project { exclude_id, fields } => docs.into_iter().map(|d| project(&d, *exclude_id, fields)).collect(),
        Stage::Sort(field, order) => {
            let mut docs = docs;
            docs.sort_by(|a, b| {
                let ordering = sort_order(lookup_path(a, field).as_ref(), lookup_path(b, field).as_ref());
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
            docs
        }
        Stage::Limit(n) => docs.into_iter().take((*n).max(0) as usize).collect(),
    }
}

fn group(docs: Vec<Document>, key: &str, sums: &[(String, String)]) -> Vec<Document> {
    let mut groups: Vec<Document> = Vec::new();
    for d in docs {
        let group_key = lookup_path(&d, key).unwrap_or(Bson::Null);
        let position = groups.iter().position(|g| g.get("_id") == Some(&group_key));
        let index = match position {
            Some(index) => index,
            None => {
                let mut fresh = doc! { "_id": group_key };
                for (output, _) in sums {
                    fresh.insert(output.clone(), Bson::Int64(0));
                }
                groups.push(fresh);
                groups.len() - 1
            }
        };
        for (output, field) in sums {
            if let Some(value) = lookup_path(&d, field) {
                let current = groups[index].get(output).cloned().unwrap_or(Bson::Int64(0));
                if let Some(total) = add_numbers(&current, &value) {
                    groups[index].insert(output.clone(), total);
                }
            }
        }
    }
    groups
}

fn join(local: Option<Bson>, foreign: &[Document], foreign_field: &str) -> Vec<Bson> {
    let keys = match local {
        Some(Bson::Array(items)) => items,
        Some(value) => vec![value],
        None => vec![Bson::Null],
    };
    foreign
        .iter()
        .filter(|f| {
            let value = lookup_path(f, foreign_field);
            keys.iter().any(|key| field_matches(value.as_ref(), key))
        })
        .cloned()
        .map(Bson::Document)
        .collect()
}

fn project(d: &Document, exclude_id: bool, fields: &[Projection]) -> Document {
    let mut out = Document::new();
    if !exclude_id {
        if let Some(id) = d.get("_id") {
            out.insert("_id", id.clone());
        }
    }
    for field in fields {
        match field {
            Projection::Include(name) => {
                if let Some(value) = lookup_path(d, name) {
                    set_path(&mut out, name, value);
                }
            }
            Projection::First { output, path } => {
                if let Some(Bson::Array(items)) = lookup_path(d, path) {
                    if let Some(first) = items.into_iter().next() {
                        out.insert(output.clone(), first);
                    }
                }
            }
        }
    }
    out
}

use super::value::{add_numbers, lookup_path, negate, remove_path, set_path};
use mongodb::bson::{Bson, Document};

/// Field-level mutation: `$set`, `$unset` and `$inc`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    set: Document,
    unset: Vec<String>,
    inc: Document,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    pub fn inc(mut self, field: impl Into<String>, by: i64) -> Self {
        self.inc.insert(field.into(), Bson::Int64(by));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.inc.is_empty()
    }

    pub fn to_document(&self) -> Document {
        let mut update = Document::new();
        if !self.set.is_empty() {
            update.insert("$set", self.set.clone());
        }
        if !self.unset.is_empty() {
            let fields: Document = self.unset.iter().map(|f| (f.clone(), Bson::String(String::new()))).collect();
            update.insert("$unset", fields);
        }
        if !self.inc.is_empty() {
            update.insert("$inc", self.inc.clone());
        }
        update
    }

    /// Applies the update in place with server semantics: `$inc` on a
    /// missing field starts from zero.
    pub fn apply(&self, document: &mut Document) {
        for (field, value) in &self.set {
            set_path(document, field, value.clone());
        }
        for field in &self.unset {
            remove_path(document, field);
        }
        for (field, by) in &self.inc {
            let next = match lookup_path(document, field) {
                Some(current) => add_numbers(&current, by).unwrap_or_else(|| by.clone()),
                None => by.clone(),
            };
            set_path(document, field, next);
        }
    }

    /// The update that restores `before` after `self` has been applied to it.
    pub fn inverse(&self, before: &Document) -> Update {
        let mut inverse = Update::new();
        for field in self.set.keys().chain(self.unset.iter()) {
            inverse = match lookup_path(before, field) {
                Some(previous) => inverse.set(field.clone(), previous),
                None => inverse.unset(field.clone()),
            };
        }
        for (field, by) in &self.inc {
            if let Some(negated) = negate(by) {
                inverse.inc.insert(field.clone(), negated);
            }
        }
        inverse
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_renders_operators() {
        let update = Update::new().set("status", "approved").inc("totalEnrolled", 1);
        assert_eq!(
            update.to_document(),
            doc! { "$set": { "status": "approved" }, "$inc": { "totalEnrolled": 1_i64 } }
        );
        assert_eq!(Update::new().unset("reason").to_document(), doc! { "$unset": { "reason": "" } });
    }

    #[test]
    fn test_apply_then_inverse_restores_document() {
        let before = doc! { "availableSeats": 5_i32, "totalEnrolled": 10_i32, "status": "pending" };
        let update = Update::new()
            .inc("availableSeats", -1)
            .inc("totalEnrolled", 1)
            .set("status", "approved")
            .set("reason", "ok");

        let mut after = before.clone();
        update.apply(&mut after);
        assert_eq!(after.get_i64("availableSeats").ok(), Some(4));
        assert_eq!(after.get_i64("totalEnrolled").ok(), Some(11));
        assert_eq!(after.get_str("reason").ok(), Some("ok"));

        update.inverse(&before).apply(&mut after);
        assert_eq!(after.get_i64("availableSeats").ok(), Some(5));
        assert_eq!(after.get_i64("totalEnrolled").ok(), Some(10));
        assert_eq!(after.get_str("status").ok(), Some("pending"));
        assert!(after.get("reason").is_none());
    }
}

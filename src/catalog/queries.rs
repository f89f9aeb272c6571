//! Read-side aggregations shared by the handlers.

use super::{Catalog, CLASSES, USERS};
use crate::models::{ClassStatus, Role};
use crate::store::{Filter, Pipeline, Projection, Query, SortOrder, StoreError};
use mongodb::bson::{doc, Document};

pub const TOP_LISTING: i64 = 6;

impl Catalog {
    /// Instructors ranked by the enrolments summed over their classes.
    ///
    /// Public listing: only the instructor's name leaves the users collection.
    pub async fn popular_instructors(&self, limit: i64) -> Result<Vec<Document>, StoreError> {
        let pipeline = Pipeline::new()
            .group_sum("instructorEmail", &[("totalEnrolled", "totalEnrolled")])
            .lookup(USERS, "_id", "email", "instructor")
            .project(
                true,
                vec![
                    Projection::First { output: "instructor".into(), path: "instructor.name".into() },
                    Projection::Include("totalEnrolled".into()),
                ],
            )
            .sort("totalEnrolled", SortOrder::Descending)
            .limit(limit);
        self.classes.aggregate(pipeline).await
    }

    /// One row per purchased class, joined with the class and its instructor.
    pub async fn enrolled_classes(&self, email: &str) -> Result<Vec<Document>, StoreError> {
        let pipeline = Pipeline::new()
            .matching(Filter::eq("userEmail", email))
            .lookup(CLASSES, "classesId", "_id", "classes")
            .unwind("classes")
            .lookup(USERS, "classes.instructorEmail", "email", "instructor")
            .project(
                true,
                vec![
                    Projection::First { output: "instructor".into(), path: "instructor".into() },
                    Projection::Include("classes".into()),
                ],
            );
        self.enrolled.aggregate(pipeline).await
    }

    pub async fn popular_classes(&self, limit: i64) -> Result<Vec<crate::models::Class>, StoreError> {
        self.classes
            .collect(Query::new(Filter::all()).sort("totalEnrolled", SortOrder::Descending).limit(limit))
            .await
    }

    pub async fn admin_stats(&self) -> Result<Document, StoreError> {
        let approved = self.classes.count(Filter::eq("status", ClassStatus::Approved.as_str())).await?;
        let pending = self.classes.count(Filter::eq("status", ClassStatus::Pending.as_str())).await?;
        let instructors = self.users.count(Filter::eq("role", Role::Instructor.as_str())).await?;
        let total_classes = self.classes.count(Filter::all()).await?;
        let total_enrolled = self.enrolled.count(Filter::all()).await?;
        Ok(doc! {
            "approvedClasses": approved as i64,
            "pendingClasses": pending as i64,
            "instructors": instructors as i64,
            "totalClasses": total_classes as i64,
            "totalEnrolled": total_enrolled as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, MemoryStore};
    use mongodb::bson::oid::ObjectId;
    use std::sync::Arc;

    async fn seeded() -> (Catalog, ObjectId, ObjectId) {
        let store = Arc::new(MemoryStore::new());
        let hatha = ObjectId::new();
        let vinyasa = ObjectId::new();
        store.insert_one(USERS, doc! { "email": "ana@yoga.io", "name": "Ana", "role": "instructor" }).await.unwrap();
        store.insert_one(USERS, doc! { "email": "rui@yoga.io", "name": "Rui", "role": "instructor" }).await.unwrap();
        store.insert_one(USERS, doc! { "email": "kim@yoga.io", "name": "Kim", "role": "admin" }).await.unwrap();
        store
            .insert_one(
                CLASSES,
                doc! { "_id": hatha, "name": "Hatha", "instructorEmail": "ana@yoga.io", "totalEnrolled": 4_i64, "status": "approved" },
            )
            .await
            .unwrap();
        store
            .insert_one(
                CLASSES,
                doc! { "_id": vinyasa, "name": "Vinyasa", "instructorEmail": "rui@yoga.io", "totalEnrolled": 7_i64, "status": "pending" },
            )
            .await
            .unwrap();
        store
            .insert_one(
                CLASSES,
                doc! { "name": "Yin", "instructorEmail": "ana@yoga.io", "totalEnrolled": 5_i64, "status": "approved" },
            )
            .await
            .unwrap();
        (Catalog::new(store), hatha, vinyasa)
    }

    #[tokio::test]
    async fn test_popular_instructors_sums_per_instructor() {
        let (catalog, _, _) = seeded().await;
        let ranked = catalog.popular_instructors(TOP_LISTING).await.unwrap();

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].get_i64("totalEnrolled").unwrap(), 9);
        assert_eq!(ranked[0].get_str("instructor").unwrap(), "Ana");
        assert_eq!(ranked[1].get_i64("totalEnrolled").unwrap(), 7);
        assert!(!ranked[0].contains_key("_id"));
        assert!(!ranked[0].keys().any(|k| k == "email" || k == "role"));
    }

    #[tokio::test]
    async fn test_enrolled_classes_join_instructor() {
        let (catalog, hatha, vinyasa) = seeded().await;
        catalog
            .store()
            .insert_one(
                super::super::ENROLLED,
                doc! { "userEmail": "sam@yoga.io", "classesId": [hatha, vinyasa], "transactionId": "pi_1" },
            )
            .await
            .unwrap();

        let rows = catalog.enrolled_classes("sam@yoga.io").await.unwrap();
        assert_eq!(rows.len(), 2);
        let first = &rows[0];
        assert_eq!(first.get_document("classes").unwrap().get_str("name").unwrap(), "Hatha");
        assert_eq!(first.get_document("instructor").unwrap().get_str("name").unwrap(), "Ana");
        assert_eq!(rows[1].get_document("instructor").unwrap().get_str("name").unwrap(), "Rui");
        assert!(catalog.enrolled_classes("other@yoga.io").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_admin_stats_counts() {
        let (catalog, _, _) = seeded().await;
        let stats = catalog.admin_stats().await.unwrap();
        assert_eq!(stats.get_i64("approvedClasses").unwrap(), 2);
        assert_eq!(stats.get_i64("pendingClasses").unwrap(), 1);
        assert_eq!(stats.get_i64("instructors").unwrap(), 2);
        assert_eq!(stats.get_i64("totalClasses").unwrap(), 3);
        assert_eq!(stats.get_i64("totalEnrolled").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_popular_classes_top_by_enrollment() {
        let (catalog, _, _) = seeded().await;
        let classes = catalog.popular_classes(2).await.unwrap();
        let names: Vec<&str> = classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Vinyasa", "Yin"]);
    }
}

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, point_id::PointIdOptions, value::Kind,
};

use crate::vector_store::{ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Qdrant-backed store using cosine distance.
pub struct QdrantStore {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStore").finish_non_exhaustive()
    }
}

impl QdrantStore {
    /// Connect to a Qdrant instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created from the URL.
    pub fn new(url: &str) -> Result<Self, VectorStoreError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;
        Ok(Self { client })
    }
}

impl VectorStore for QdrantStore {
    fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            if exists {
                return Ok(());
            }
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&collection)
                        .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
                )
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))?;
            tracing::debug!(collection = %collection, vector_size, "created collection");
            Ok(())
        })
    }

    fn collection_exists(&self, collection: &str) -> BoxFuture<'_, Result<bool, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .collection_exists(&collection)
                .await
                .map_err(|e| VectorStoreError::Collection(e.to_string()))
        })
    }

    fn delete_collection(&self, collection: &str) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            self.client
                .delete_collection(&collection)
                .await
                .map_err(|e| VectorStoreError::Delete(e.to_string()))?;
            Ok(())
        })
    }

    fn upsert(
        &self,
        collection: &str,
        points: Vec<VectorPoint>,
    ) -> BoxFuture<'_, Result<(), VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let mut qdrant_points = Vec::with_capacity(points.len());
            for p in points {
                let payload = to_qdrant_payload(p.payload)?;
                qdrant_points.push(PointStruct::new(p.id, p.vector, payload));
            }
            self.client
                .upsert_points(UpsertPointsBuilder::new(&collection, qdrant_points))
                .await
                .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;
            Ok(())
        })
    }

    fn search(
        &self,
        collection: &str,
        vector: Vec<f32>,
        limit: u64,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>> {
        let collection = collection.to_owned();
        Box::pin(async move {
            let builder =
                SearchPointsBuilder::new(&collection, vector, limit).with_payload(true);
            let results = self
                .client
                .search_points(builder)
                .await
                .map_err(|e| VectorStoreError::Search(e.to_string()))?;

            Ok(results
                .result
                .into_iter()
                .map(|point| {
                    let id = match point.id.and_then(|pid| pid.point_id_options) {
                        Some(PointIdOptions::Uuid(u)) => u,
                        Some(PointIdOptions::Num(n)) => n.to_string(),
                        None => String::new(),
                    };
                    ScoredVectorPoint {
                        id,
                        score: point.score,
                        payload: from_qdrant_payload(point.payload),
                    }
                })
                .collect())
        })
    }
}

fn to_qdrant_payload(
    payload: HashMap<String, serde_json::Value>,
) -> Result<HashMap<String, qdrant_client::qdrant::Value>, VectorStoreError> {
    let object = serde_json::Value::Object(payload.into_iter().collect());
    serde_json::from_value(object).map_err(|e| VectorStoreError::Serialization(e.to_string()))
}

fn from_qdrant_payload(
    payload: HashMap<String, qdrant_client::qdrant::Value>,
) -> HashMap<String, serde_json::Value> {
    payload
        .into_iter()
        .filter_map(|(k, v)| {
            let json = match v.kind? {
                Kind::StringValue(s) => serde_json::Value::String(s),
                Kind::IntegerValue(i) => serde_json::Value::from(i),
                Kind::DoubleValue(d) => serde_json::Value::from(d),
                Kind::BoolValue(b) => serde_json::Value::Bool(b),
                _ => return None,
            };
            Some((k, json))
        })
        .collect()
}

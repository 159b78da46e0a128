use bson::oid::ObjectId;
use bson::{Bson, Document};
use chrono::Utc;

use crate::domain::{TagPreference, UserPreference};
use crate::pipeline::{fields, Filter};
use crate::store::{Collection, EntityStore, StoreResult};

pub async fn find_by_user<S: EntityStore>(store: &S, user_id: &str) -> StoreResult<Option<UserPreference>> {
    store
        .find_one(Collection::Preferences, &Filter::eq(fields::USER_ID, user_id))
        .await?
        .map(bson::from_document)
        .transpose()
        .map_err(Into::into)
}

/// Insert an empty preference document for `user_id`.
pub async fn create<S: EntityStore>(store: &S, user_id: &str) -> StoreResult<UserPreference> {
    let mut preference = UserPreference::new(user_id);
    let document = bson::to_document(&preference)?;
    preference.id = Some(store.insert_one(Collection::Preferences, document).await?);
    Ok(preference)
}

/// Replace the tag weights of a preference document. Returns false when it is gone.
pub async fn update_tags<S: EntityStore>(
    store: &S,
    id: ObjectId,
    tags: &[TagPreference],
) -> StoreResult<bool> {
    let mut values = Document::new();
    values.insert(fields::TAGS.as_str(), bson::to_bson(tags)?);
    values.insert(fields::UPDATED_AT.as_str(), Bson::DateTime(Utc::now().into()));
    store.set_fields(Collection::Preferences, id, values).await
}

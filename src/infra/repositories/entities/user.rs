//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;

use crate::domain::User;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Provider subject id (NULL = no external identity linked)
    #[sea_orm(unique)]
    pub external_id: Option<String>,
    /// Lower-cased local username (NULL = no local credential)
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub email: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Convert database model to domain entity
impl From<Model> for User {
    fn from(model: Model) -> Self {
        User {
            id: model.id,
            external_id: model.external_id,
            username: model.username,
            password_hash: model.password_hash,
            email: model.email,
            name: model.name,
            first_name: model.first_name,
            last_name: model.last_name,
            avatar: model.avatar,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Convert domain entity to a fully populated active model
impl From<User> for ActiveModel {
    fn from(user: User) -> Self {
        use sea_orm::Set;

        ActiveModel {
            id: Set(user.id),
            external_id: Set(user.external_id),
            username: Set(user.username),
            password_hash: Set(user.password_hash),
            email: Set(user.email),
            name: Set(user.name),
            first_name: Set(user.first_name),
            last_name: Set(user.last_name),
            avatar: Set(user.avatar),
            created_at: Set(user.created_at),
            updated_at: Set(user.updated_at),
        }
    }
}

//! User database entity for SeaORM.

use sea_orm::entity::prelude::*;

use domain::User;

use crate::repository::Identifiable;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Identifiable for Model {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Model {
    /// Overwrite every mutable field with the values carried by `user`.
    pub fn copy_fields_from(&mut self, user: User) {
        self.first_name = user.first_name;
        self.last_name = user.last_name;
        self.email = user.email;
        self.password = user.password;
    }
}

/// Convert database model to domain entity
impl From<Model> for User {
    fn from(model: Model) -> Self {
        User {
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            password: model.password,
        }
    }
}

/// Convert domain entity to database model
impl From<User> for Model {
    fn from(user: User) -> Self {
        Model {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            password: user.password,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_fields_keeps_identity() {
        let original = User::new("Ada", "Lovelace", "ada@example.com", "analytical");
        let mut model = Model::from(original.clone());

        let replacement = User::new("Grace", "Hopper", "grace@example.com", "compiler");
        model.copy_fields_from(replacement);

        assert_eq!(model.id, original.id);
        assert_eq!(model.first_name, "Grace");
        assert_eq!(model.email, "grace@example.com");
        assert_eq!(model.password, "compiler");
    }
}

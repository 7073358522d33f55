use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{appresult::require, AppResult};

use super::History;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forum {
    pub uuid: Uuid,
    pub id: String,
    pub title: String,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewForum {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl History {
    pub async fn create_forum(&self, new: &NewForum) -> AppResult<Forum> {
        let forum = Forum {
            uuid: Uuid::now_v7(),
            id: require(new.id.as_deref(), "id")?.to_owned(),
            title: require(new.title.as_deref(), "title")?.to_owned(),
            description: require(new.description.as_deref(), "description")?.to_owned(),
            image: require(new.image.as_deref(), "image")?.to_owned(),
        };

        sqlx::query("INSERT INTO forums (uuid,id,title,description,image) VALUES (?,?,?,?,?)")
            .bind(forum.uuid.to_string())
            .bind(&forum.id)
            .bind(&forum.title)
            .bind(&forum.description)
            .bind(&forum.image)
            .execute(&self.db_pool)
            .await?;

        tracing::info!(forum = %forum.uuid, title = %forum.title, "forum created");
        Ok(forum)
    }

    pub async fn list_forums(&self) -> AppResult<Vec<Forum>> {
        let rows: Vec<(String, String, String, String, String)> =
            sqlx::query_as("SELECT uuid,id,title,description,image FROM forums ORDER BY rowid")
                .fetch_all(&self.db_pool)
                .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(uuid, id, title, description, image)| {
                Some(Forum {
                    uuid: Uuid::parse_str(&uuid).ok()?,
                    id,
                    title,
                    description,
                    image,
                })
            })
            .collect())
    }

    pub async fn forum_exists(&self, uuid: Uuid) -> AppResult<bool> {
        Ok(sqlx::query("SELECT 1 FROM forums WHERE uuid=?")
            .bind(uuid.to_string())
            .fetch_optional(&self.db_pool)
            .await?
            .is_some())
    }
}

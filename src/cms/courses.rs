//! Course catalog: Strapi entities flattened into plain records.
//!
//! The CMS nests every relation as `{data: [{id, attributes: {..}}]}`. The
//! catalog flattens course → module → class → topic into records where each
//! relation is a plain list, empty when the CMS did not populate it.

use super::CmsClient;
use crate::auth::exchange::{StoreError, StoreFuture};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::instrument;
use url::form_urlencoded;
use utoipa::ToSchema;

const POPULATE_QUERY: &str =
    "populate[modules][populate][classes][populate]=topics&populate[thumbnail]=*";

/// Strapi sends `null` for unset attributes; read those as the type default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Deserialize)]
pub struct StrapiEntity<A> {
    pub id: u64,
    pub attributes: A,
}

#[derive(Debug, Deserialize)]
pub struct StrapiCollection<A> {
    #[serde(default = "Vec::new")]
    pub data: Vec<StrapiEntity<A>>,
}

#[derive(Debug, Deserialize)]
pub struct StrapiSingle<A> {
    #[serde(default = "Option::default")]
    pub data: Option<StrapiEntity<A>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TopicAttributes {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub order_index: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassAttributes {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub slug: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub video_type: Option<String>,
    pub duration: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub order_index: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub is_free_preview: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
    pub topics: Option<StrapiCollection<TopicAttributes>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleAttributes {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub order_index: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
    pub classes: Option<StrapiCollection<ClassAttributes>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaAttributes {
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    pub alternative_text: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseAttributes {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub slug: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    pub level: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_public: bool,
    pub price: Option<f64>,
    pub discount_price: Option<f64>,
    pub estimated_duration: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(deserialize_with = "null_as_default")]
    pub updated_at: String,
    pub thumbnail: Option<StrapiSingle<MediaAttributes>>,
    pub modules: Option<StrapiCollection<ModuleAttributes>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order_index: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: u64,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub order_index: i64,
    pub is_free_preview: bool,
    pub created_at: String,
    pub updated_at: String,
    pub topics: Vec<Topic>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order_index: i64,
    pub created_at: String,
    pub updated_at: String,
    pub classes: Vec<Class>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: u64,
    pub title: String,
    pub slug: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
    pub modules: Vec<Module>,
}

fn flatten_list<A, T>(
    collection: Option<StrapiCollection<A>>,
    flatten: fn(StrapiEntity<A>) -> T,
) -> Vec<T> {
    collection
        .map(|collection| collection.data.into_iter().map(flatten).collect())
        .unwrap_or_default()
}

#[must_use]
pub fn flatten_topic(topic: StrapiEntity<TopicAttributes>) -> Topic {
    let StrapiEntity { id, attributes } = topic;
    Topic {
        id,
        title: attributes.title,
        description: attributes.description,
        order_index: attributes.order_index,
        created_at: attributes.created_at,
        updated_at: attributes.updated_at,
    }
}

#[must_use]
pub fn flatten_class(class: StrapiEntity<ClassAttributes>) -> Class {
    let StrapiEntity { id, attributes } = class;
    Class {
        id,
        title: attributes.title,
        slug: attributes.slug,
        description: attributes.description,
        video_url: attributes.video_url,
        video_type: attributes.video_type,
        duration: attributes.duration,
        order_index: attributes.order_index,
        is_free_preview: attributes.is_free_preview,
        created_at: attributes.created_at,
        updated_at: attributes.updated_at,
        topics: flatten_list(attributes.topics, flatten_topic),
    }
}

#[must_use]
pub fn flatten_module(module: StrapiEntity<ModuleAttributes>) -> Module {
    let StrapiEntity { id, attributes } = module;
    Module {
        id,
        title: attributes.title,
        description: attributes.description,
        order_index: attributes.order_index,
        created_at: attributes.created_at,
        updated_at: attributes.updated_at,
        classes: flatten_list(attributes.classes, flatten_class),
    }
}

#[must_use]
pub fn flatten_course(course: StrapiEntity<CourseAttributes>) -> Course {
    let StrapiEntity { id, attributes } = course;
    let thumbnail = attributes
        .thumbnail
        .and_then(|single| single.data)
        .map(|media| Thumbnail {
            url: media.attributes.url,
            alternative_text: media.attributes.alternative_text,
            width: media.attributes.width,
            height: media.attributes.height,
        });
    Course {
        id,
        title: attributes.title,
        slug: attributes.slug,
        description: attributes.description,
        level: attributes.level,
        is_public: attributes.is_public,
        price: attributes.price,
        discount_price: attributes.discount_price,
        estimated_duration: attributes.estimated_duration,
        created_at: attributes.created_at,
        updated_at: attributes.updated_at,
        thumbnail,
        modules: flatten_list(attributes.modules, flatten_module),
    }
}

/// Read side of the course catalog.
pub trait CourseCatalog: Send + Sync {
    fn courses(&self) -> StoreFuture<'_, Vec<Course>>;

    /// First course whose slug matches, `Ok(None)` when there is none.
    fn course_by_slug<'a>(&'a self, slug: &'a str) -> StoreFuture<'a, Option<Course>>;
}

impl CmsClient {
    #[instrument(skip(self))]
    async fn fetch_courses(&self) -> Result<Vec<Course>, StoreError> {
        let collection: StrapiCollection<CourseAttributes> = self
            .get_json(&format!("/api/courses?{POPULATE_QUERY}"), None)
            .await?;
        Ok(collection.data.into_iter().map(flatten_course).collect())
    }

    #[instrument(skip(self))]
    async fn fetch_course_by_slug(&self, slug: &str) -> Result<Option<Course>, StoreError> {
        let slug: String = form_urlencoded::byte_serialize(slug.as_bytes()).collect();
        let collection: StrapiCollection<CourseAttributes> = self
            .get_json(
                &format!("/api/courses?filters[slug][$eq]={slug}&{POPULATE_QUERY}"),
                None,
            )
            .await?;
        Ok(collection.data.into_iter().next().map(flatten_course))
    }
}

impl CourseCatalog for CmsClient {
    fn courses(&self) -> StoreFuture<'_, Vec<Course>> {
        Box::pin(self.fetch_courses())
    }

    fn course_by_slug<'a>(&'a self, slug: &'a str) -> StoreFuture<'a, Option<Course>> {
        Box::pin(self.fetch_course_by_slug(slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strapi_topic() -> serde_json::Value {
        json!({
            "id": 1000,
            "attributes": {
                "title": "Shared references",
                "orderIndex": 1,
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-01T00:00:00.000Z"
            }
        })
    }

    fn strapi_class() -> serde_json::Value {
        json!({
            "id": 100,
            "attributes": {
                "title": "Borrowing",
                "slug": "borrowing",
                "videoUrl": "https://videos.example.com/borrowing.mp4",
                "videoType": "mp4",
                "orderIndex": 1,
                "isFreePreview": true,
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-01T00:00:00.000Z",
                "topics": {"data": [strapi_topic()]}
            }
        })
    }

    fn strapi_module(classes: Vec<serde_json::Value>) -> serde_json::Value {
        json!({
            "id": 10,
            "attributes": {
                "title": "Basics",
                "orderIndex": 1,
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-01T00:00:00.000Z",
                "classes": {"data": classes}
            }
        })
    }

    fn strapi_course() -> serde_json::Value {
        let thumbnail = json!({
            "id": 9,
            "attributes": {"url": "/uploads/rust.png", "alternativeText": "crab", "width": 640, "height": 360}
        });
        json!({
            "id": 1,
            "attributes": {
                "title": "Rust 101",
                "slug": "rust-101",
                "description": "Ownership from scratch",
                "level": "Beginner",
                "isPublic": true,
                "price": 49.0,
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-02T00:00:00.000Z",
                "thumbnail": {"data": thumbnail},
                "modules": {"data": [strapi_module(vec![strapi_class()])]}
            }
        })
    }

    #[test]
    fn flattens_full_tree() -> anyhow::Result<()> {
        let entity: StrapiEntity<CourseAttributes> = serde_json::from_value(strapi_course())?;
        let course = flatten_course(entity);

        assert_eq!(course.slug, "rust-101");
        assert_eq!(course.level.as_deref(), Some("Beginner"));
        assert_eq!(
            course.thumbnail.as_ref().map(|thumb| thumb.url.as_str()),
            Some("/uploads/rust.png")
        );
        let class = &course.modules[0].classes[0];
        assert_eq!(class.slug, "borrowing");
        assert!(class.is_free_preview);
        assert_eq!(class.topics[0].title, "Shared references");
        Ok(())
    }

    #[test]
    fn missing_relations_flatten_to_empty_lists() -> anyhow::Result<()> {
        let entity: StrapiEntity<CourseAttributes> = serde_json::from_value(json!({
            "id": 2,
            "attributes": {
                "title": "Empty",
                "slug": "empty",
                "description": "",
                "isPublic": false,
                "thumbnail": {"data": null},
                "modules": {"data": [{"id": 3, "attributes": {"title": "No classes"}}]}
            }
        }))?;
        let course = flatten_course(entity);
        assert!(course.thumbnail.is_none());
        assert_eq!(course.modules.len(), 1);
        assert!(course.modules[0].classes.is_empty());
        Ok(())
    }

    #[test]
    fn flattened_course_serializes_camel_case() -> anyhow::Result<()> {
        let entity: StrapiEntity<CourseAttributes> = serde_json::from_value(strapi_course())?;
        let value = serde_json::to_value(flatten_course(entity))?;
        assert_eq!(value["isPublic"], json!(true));
        assert_eq!(value["modules"][0]["classes"][0]["videoUrl"], json!("https://videos.example.com/borrowing.mp4"));
        assert!(value.get("discountPrice").is_none());
        Ok(())
    }

    #[test]
    fn null_attributes_read_as_defaults() -> anyhow::Result<()> {
        let unset_class = json!({
            "id": 101,
            "attributes": {
                "title": "Lifetimes",
                "slug": null,
                "orderIndex": null,
                "isFreePreview": null,
                "createdAt": null,
                "updatedAt": null,
                "topics": {"data": []}
            }
        });
        let sparse = json!({
            "id": 3,
            "attributes": {
                "title": "Sparse",
                "slug": "sparse",
                "description": null,
                "isPublic": null,
                "thumbnail": {"data": null},
                "modules": {"data": [strapi_module(vec![strapi_class(), unset_class])]}
            }
        });
        let collection: StrapiCollection<CourseAttributes> =
            serde_json::from_value(json!({"data": [strapi_course(), sparse]}))?;
        let courses: Vec<Course> = collection.data.into_iter().map(flatten_course).collect();

        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].slug, "rust-101");
        let sparse = &courses[1];
        assert_eq!(sparse.description, "");
        assert!(!sparse.is_public);
        let class = &sparse.modules[0].classes[1];
        assert_eq!(class.title, "Lifetimes");
        assert_eq!(class.order_index, 0);
        assert!(!class.is_free_preview);
        assert!(class.slug.is_empty());
        Ok(())
    }
}

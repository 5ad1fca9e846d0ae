//! Typed CRUD endpoints for the backend's resource collections.
//!
//! Routes follow the backend's scheme: `GET /{Collection}`,
//! `GET /{Collection}/{id}`, `POST /{Collection}/Create{Entity}`,
//! `PUT /{Collection}/Update{Entity}/{id}`, `DELETE /{Collection}/Delete{Entity}/{id}`.
//! Menu items are the exception: they are written as multipart forms.

use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::client::{ApiClient, RequestBody, RequestOptions};
use super::error::ApiError;
use super::types::*;

/// A collection that can be listed and fetched by id.
pub trait Resource: DeserializeOwned + Serialize {
    /// Collection segment, e.g. `Category` in `/Category`.
    const COLLECTION: &'static str;
}

/// A collection with create/update/delete routes.
pub trait Editable: Resource {
    /// Entity segment, e.g. `Category` in `/Category/CreateCategory`.
    const ENTITY: &'static str;
    type Draft: Serialize + DeserializeOwned;
}

macro_rules! resource {
    ($ty:ty, $collection:literal) => {
        impl Resource for $ty {
            const COLLECTION: &'static str = $collection;
        }
    };
    ($ty:ty, $collection:literal, $entity:literal, $draft:ty) => {
        resource!($ty, $collection);
        impl Editable for $ty {
            const ENTITY: &'static str = $entity;
            type Draft = $draft;
        }
    };
}

resource!(Category, "Category", "Category", CategoryDraft);
resource!(Material, "Material", "Material", MaterialDraft);
resource!(Supplier, "Suppliers", "Suppliers", SupplierDraft);
resource!(Table, "Table", "Table", TableDraft);
resource!(InventoryLot, "Inventory", "Inventory", InventoryDraft);
resource!(Reservation, "Reservations", "Reservations", ReservationDraft);
resource!(Feature, "Feature", "Feature", FeatureDraft);
resource!(Unit, "Unit");
resource!(User, "Users");
resource!(MenuItem, "MenuItems");

/// Parse a response body as an envelope, failing on non-success statuses.
pub async fn read_envelope<T: DeserializeOwned>(resp: Response) -> Result<Envelope<T>, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::Status { status, body });
    }
    resp.json::<Envelope<T>>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn id_segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

pub async fn list<R: Resource>(client: &ApiClient) -> Result<Vec<R>, ApiError> {
    let path = format!("/{}", R::COLLECTION);
    let resp = client.get(&path, RequestOptions::default()).await?;
    read_envelope(resp).await?.into_data()
}

pub async fn show<R: Resource>(client: &ApiClient, id: &str) -> Result<R, ApiError> {
    let path = format!("/{}/{}", R::COLLECTION, id_segment(id));
    let resp = client.get(&path, RequestOptions::default()).await?;
    read_envelope(resp).await?.into_data()
}

/// Create an entity. Returns whatever `data` the backend echoed back.
pub async fn create<R: Editable>(
    client: &ApiClient,
    draft: &R::Draft,
) -> Result<Option<serde_json::Value>, ApiError> {
    let path = format!("/{}/Create{}", R::COLLECTION, R::ENTITY);
    let resp = client
        .post(&path, Some(RequestBody::json(draft)?), RequestOptions::default())
        .await?;
    Ok(read_envelope::<serde_json::Value>(resp)
        .await?
        .ensure_success()?
        .data)
}

pub async fn update<R: Editable>(
    client: &ApiClient,
    id: &str,
    draft: &R::Draft,
) -> Result<Option<serde_json::Value>, ApiError> {
    let path = format!("/{}/Update{}/{}", R::COLLECTION, R::ENTITY, id_segment(id));
    let resp = client
        .put(&path, Some(RequestBody::json(draft)?), RequestOptions::default())
        .await?;
    Ok(read_envelope::<serde_json::Value>(resp)
        .await?
        .ensure_success()?
        .data)
}

pub async fn delete<R: Editable>(
    client: &ApiClient,
    id: &str,
) -> Result<Option<serde_json::Value>, ApiError> {
    let path = format!("/{}/Delete{}/{}", R::COLLECTION, R::ENTITY, id_segment(id));
    let resp = client.delete(&path, RequestOptions::default()).await?;
    Ok(read_envelope::<serde_json::Value>(resp)
        .await?
        .ensure_success()?
        .data)
}

/// Inventory lots received for one material.
pub async fn inventory_for_material(
    client: &ApiClient,
    material_id: &str,
) -> Result<Vec<InventoryLot>, ApiError> {
    // The backend route really is spelled "marial".
    let path = format!("/Inventory/marial/{}", id_segment(material_id));
    let resp = client.get(&path, RequestOptions::default()).await?;
    read_envelope(resp).await?.into_data()
}

// ── Menu items ────────────────────────────────────────────────────────────────

/// Image file attached to a menu item form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read an image from disk, guessing the MIME type from the extension.
    pub fn from_path(path: &std::path::Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mime = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => "image/png",
            Some("jpg") | Some("jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        };
        Ok(Self {
            file_name,
            mime: mime.to_string(),
            bytes,
        })
    }
}

fn menu_item_form(
    draft: &MenuItemDraft,
    image: Option<ImageUpload>,
) -> Result<Form, ApiError> {
    let mut form = Form::new()
        .text("Name", draft.name.clone())
        .text("CategoryId", draft.category_id.clone())
        .text("Description", draft.description.clone())
        .text("Price", draft.price.to_string())
        .text("IsPromotion", draft.is_promotion.to_string());

    if let Some(end) = draft.promotion_end.as_ref().filter(|s| !s.is_empty()) {
        form = form.text("PromotionEnd", end.clone());
    }
    if let Some(discount) = draft.discount_percent {
        form = form.text("DiscountPercent", discount.to_string());
    }
    if let Some(image) = image {
        let part = Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime)?;
        form = form.part("Image", part);
    }
    Ok(form)
}

/// POST /MenuItems/CreateMenuItem as multipart form data.
pub async fn create_menu_item(
    client: &ApiClient,
    draft: &MenuItemDraft,
    image: Option<ImageUpload>,
) -> Result<Option<serde_json::Value>, ApiError> {
    let form = menu_item_form(draft, image)?;
    let resp = client
        .post(
            "/MenuItems/CreateMenuItem",
            Some(RequestBody::Multipart(form)),
            RequestOptions::default(),
        )
        .await?;
    Ok(read_envelope::<serde_json::Value>(resp)
        .await?
        .ensure_success()?
        .data)
}

/// PUT /MenuItems/UpdateMenuItem; the id travels in the form, not the path.
pub async fn update_menu_item(
    client: &ApiClient,
    id: &str,
    draft: &MenuItemDraft,
    image: Option<ImageUpload>,
) -> Result<Option<serde_json::Value>, ApiError> {
    let form = menu_item_form(draft, image)?.text("Id", id.to_string());
    let resp = client
        .put(
            "/MenuItems/UpdateMenuItem",
            Some(RequestBody::Multipart(form)),
            RequestOptions::default(),
        )
        .await?;
    Ok(read_envelope::<serde_json::Value>(resp)
        .await?
        .ensure_success()?
        .data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, ApiClient) {
        let server = MockServer::start().await;
        let client = ApiClient::new(&format!("{}/api", server.uri()));
        (server, client)
    }

    fn ok(data: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "success": true, "data": data }))
    }

    #[tokio::test]
    async fn test_list_categories() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/Category"))
            .respond_with(ok(json!([
                { "id": "c1", "name": "Coffee" },
                { "id": "c2", "name": "Tea" }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let categories: Vec<Category> = list(&client).await.unwrap();
        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Coffee", "Tea"]);
    }

    #[tokio::test]
    async fn test_show_user_encodes_id() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/Users/a%20b"))
            .respond_with(ok(json!({
                "id": "a b",
                "userName": "staff",
                "email": "staff@fbstore.com",
                "twoFactorEnabled": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let user: User = show(&client, "a b").await.unwrap();
        assert_eq!(user.user_name, "staff");
        assert!(user.two_factor_enabled);
        assert!(!user.email_confirmed);
    }

    #[tokio::test]
    async fn test_create_table_posts_draft() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/Table/CreateTable"))
            .and(body_json(json!({
                "name": "T1",
                "capacity": 4,
                "location": "Terrace",
                "type": "Outdoor",
                "status": 0
            })))
            .respond_with(ok(json!({ "id": "t1" })))
            .expect(1)
            .mount(&server)
            .await;

        let draft = TableDraft {
            name: "T1".into(),
            capacity: 4,
            location: "Terrace".into(),
            kind: "Outdoor".into(),
            status: 0,
        };
        let data = create::<Table>(&client, &draft).await.unwrap();
        assert_eq!(data, Some(json!({ "id": "t1" })));
    }

    #[tokio::test]
    async fn test_update_and_delete_routes() {
        let (server, client) = setup().await;
        Mock::given(method("PUT"))
            .and(path("/api/Suppliers/UpdateSuppliers/s1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/Reservations/DeleteReservations/r9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let draft = SupplierDraft {
            name: "Dalat Farm".into(),
            phone: "0901".into(),
            email: "farm@example.com".into(),
            address: "Dalat".into(),
            payment_terms: "NET30".into(),
        };
        assert_eq!(update::<Supplier>(&client, "s1", &draft).await.unwrap(), None);
        assert_eq!(delete::<Reservation>(&client, "r9").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejected_envelope() {
        let (server, client) = setup().await;
        Mock::given(method("DELETE"))
            .and(path("/api/Category/DeleteCategory/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "message": "Category is in use"
            })))
            .mount(&server)
            .await;

        match delete::<Category>(&client, "c1").await {
            Err(ApiError::Rejected(msg)) => assert_eq!(msg, "Category is in use"),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/Material"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        match list::<Material>(&client).await {
            Err(ApiError::Status { status, body }) => {
                assert_eq!(status.as_u16(), 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inventory_for_material() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/api/Inventory/marial/m1"))
            .respond_with(ok(json!([{
                "id": "i1",
                "materialId": "m1",
                "quantity": 12.5,
                "price": 30000,
                "supplierId": "s1",
                "importDate": "2024-05-01",
                "expiryDate": "2024-06-01",
                "material": { "id": "m1", "name": "Milk" }
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let lots = inventory_for_material(&client, "m1").await.unwrap();
        assert_eq!(lots.len(), 1);
        assert_eq!(lots[0].quantity, 12.5);
        assert_eq!(lots[0].material.as_ref().unwrap().name, "Milk");
    }

    #[tokio::test]
    async fn test_create_menu_item_sends_multipart() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/MenuItems/CreateMenuItem"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .and(body_string_contains("name=\"Price\""))
            .and(body_string_contains("45000"))
            .and(body_string_contains("filename=\"latte.png\""))
            .and(body_string_contains("PNGDATA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let draft = MenuItemDraft {
            name: "Latte".into(),
            description: "Hot".into(),
            category_id: "c1".into(),
            price: 45000.0,
            is_promotion: false,
            promotion_end: None,
            discount_percent: None,
        };
        let image = ImageUpload {
            file_name: "latte.png".into(),
            mime: "image/png".into(),
            bytes: b"PNGDATA".to_vec(),
        };
        create_menu_item(&client, &draft, Some(image)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_menu_item_sends_id_in_form() {
        let (server, client) = setup().await;
        Mock::given(method("PUT"))
            .and(path("/api/MenuItems/UpdateMenuItem"))
            .and(body_string_contains("name=\"Id\""))
            .and(body_string_contains("menu-7"))
            .and(body_string_contains("name=\"DiscountPercent\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let draft = MenuItemDraft {
            name: "Latte".into(),
            description: String::new(),
            category_id: "c1".into(),
            price: 40000.0,
            is_promotion: true,
            promotion_end: Some("2024-12-31T00:00:00Z".into()),
            discount_percent: Some(10.0),
        };
        update_menu_item(&client, "menu-7", &draft, None).await.unwrap();
    }

    #[test]
    fn test_image_upload_guesses_mime() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cake.JPG");
        std::fs::write(&file, b"jpeg").unwrap();

        let image = ImageUpload::from_path(&file).unwrap();
        assert_eq!(image.file_name, "cake.JPG");
        assert_eq!(image.mime, "image/jpeg");
        assert_eq!(image.bytes, b"jpeg");
    }
}

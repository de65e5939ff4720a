use std::sync::Arc;

use rust_decimal::Decimal;
use tempfile::TempDir;

use techstore::auth::{hash_password, LoginRequest, Registration};
use techstore::catalog::ImageUpload;
use techstore::client::{CheckoutFlow, CheckoutState, ClientError, Route};
use techstore::contact::ContactRelay;
use techstore::domain::aggregates::{OrderStatus, ProductDraft, ShippingDetails, User};
use techstore::domain::value_objects::{Category, Email, Role, Stock};
use techstore::images::FsImageStore;
use techstore::listing::{OrderQuery, ProductFilter, ProductQuery};
use techstore::publisher::LogPublisher;
use techstore::repository::{InMemoryRepository, UserRepository};
use techstore::storage::{CookieJar, KeyValueStore, MemoryStore, StorageError, StorageService};
use techstore::{router, AppState, StorefrontClient};

struct Server {
    base_url: String,
    _images: TempDir,
}

async fn spawn_server() -> Server {
    let repo = Arc::new(InMemoryRepository::new());
    let images = tempfile::tempdir().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let store = Arc::new(FsImageStore::new(images.path(), format!("{base_url}/images")));
    let state = AppState::new(repo.clone(), store, Arc::new(LogPublisher), ContactRelay::new(reqwest::Client::new(), None));
    let app = router(state, Some(images.path()));
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let mut admin =
        User::new("Ada", "Admin", Email::parse("admin@techstore.test").unwrap(), hash_password("admin-pw").unwrap()).unwrap();
    admin.role = Role::Admin;
    repo.insert_user(&admin).await.unwrap();

    Server { base_url, _images: images }
}

fn client(server: &Server, storage: StorageService) -> StorefrontClient {
    StorefrontClient::new(reqwest::Client::new(), &server.base_url, storage)
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest { email: email.to_string(), password: password.to_string() }
}

async fn sign_up(client: &StorefrontClient, email: &str) {
    let form = Registration {
        first_name: "Ana".into(),
        last_name: "Horvat".into(),
        email: email.into(),
        password: "pw-123".into(),
        confirm_password: "pw-123".into(),
        ..Default::default()
    };
    client.register(&form).await.unwrap();
    client.login(&login(email, "pw-123")).await.unwrap();
}

fn draft(name: &str, cents: i64) -> ProductDraft {
    ProductDraft {
        name: name.into(),
        brand: "Fotix".into(),
        category: Category::Cameras,
        price: Decimal::new(cents, 2),
        description: format!("{name} for everyday shooting"),
    }
}

fn image(filename: &str) -> ImageUpload { ImageUpload { filename: filename.into(), bytes: b"\x89PNG fake".to_vec() } }

fn shipping() -> ShippingDetails {
    ShippingDetails {
        first_name: "Ana".into(),
        last_name: "Horvat".into(),
        address: "Ilica 1, Zagreb".into(),
        phone: "091 555 123".into(),
    }
}

#[tokio::test]
async fn test_shopping_flow_end_to_end() {
    let server = spawn_server().await;
    let admin = client(&server, StorageService::ephemeral());
    admin.login(&login("admin@techstore.test", "admin-pw")).await.unwrap();
    let a = admin.create_product(&draft("Camera", 1000), Stock::new(5), image("camera.png")).await.unwrap();
    let b = admin.create_product(&draft("Tripod", 500), Stock::new(1), image("tripod.png")).await.unwrap();
    assert_eq!(a.image_url, format!("{}/images/camera.png", server.base_url));

    let dir = tempfile::tempdir().unwrap();
    let shopper = client(&server, StorageService::open(dir.path().join("storage.json")).unwrap());
    sign_up(&shopper, "ana@example.com").await;
    assert_eq!(shopper.resolve(Route::Checkout), Route::Checkout);
    assert_eq!(shopper.resolve(Route::AdminOrders), Route::Home);

    shopper.add_to_cart(a.product.id()).await.unwrap();
    shopper.add_to_cart(a.product.id()).await.unwrap();
    shopper.add_to_cart(b.product.id()).await.unwrap();
    assert_eq!(shopper.cart().get().unwrap().item_count(), 3);
    assert_eq!(shopper.cart().total().unwrap(), Decimal::new(2500, 2));

    let flow = CheckoutFlow::new();
    let state = flow.submit(&shopper, &shipping()).await;
    let order_id = match state {
        CheckoutState::Succeeded(id) => id,
        other => panic!("checkout failed: {other:?}"),
    };
    assert_eq!(flow.next_route(&shopper), Some(Route::Orders));
    assert!(shopper.cart().get().unwrap().is_empty());

    assert_eq!(shopper.product(a.product.id()).await.unwrap().product.stock(), Stock::new(3));
    assert_eq!(shopper.product(b.product.id()).await.unwrap().product.stock(), Stock::new(0));

    let orders = shopper.my_orders(&OrderQuery::default()).await.unwrap();
    assert_eq!(orders.total, 1);
    assert_eq!(orders.data[0].item_count, 3);
    assert_eq!(orders.data[0].order.total(), Decimal::new(2500, 2));
    let detail = shopper.my_order(order_id).await.unwrap();
    assert_eq!(detail.items.len(), 2);

    let shipped = admin.set_order_status(order_id, OrderStatus::Shipped).await.unwrap();
    assert_eq!(shipped.status(), OrderStatus::Shipped);

    let query = ProductQuery { filter: ProductFilter { name: Some("tri".into()), ..Default::default() }, ..Default::default() };
    let low = admin.inventory(&query).await.unwrap();
    assert_eq!(low.total, 1);
    assert!(low.data[0].low_stock);
}

#[tokio::test]
async fn test_shortage_is_reported_and_cart_kept() {
    let server = spawn_server().await;
    let admin = client(&server, StorageService::ephemeral());
    admin.login(&login("admin@techstore.test", "admin-pw")).await.unwrap();
    let tripod = admin.create_product(&draft("Tripod", 500), Stock::new(1), image("tripod.png")).await.unwrap();

    let shopper = client(&server, StorageService::ephemeral());
    sign_up(&shopper, "ana@example.com").await;
    shopper.add_to_cart(tripod.product.id()).await.unwrap();
    shopper.cart().set_quantity(tripod.product.id(), 2).unwrap();

    let flow = CheckoutFlow::new();
    let CheckoutState::Failed(message) = flow.submit(&shopper, &shipping()).await else { panic!("checkout should fail") };
    assert!(message.contains("Tripod"), "{message}");
    assert_eq!(flow.next_route(&shopper), None);
    assert_eq!(shopper.cart().get().unwrap().item_count(), 2);
    assert_eq!(shopper.my_orders(&OrderQuery::default()).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_last_unit_sells_once() {
    let server = spawn_server().await;
    let admin = client(&server, StorageService::ephemeral());
    admin.login(&login("admin@techstore.test", "admin-pw")).await.unwrap();
    let last = admin.create_product(&draft("Lens", 25000), Stock::new(1), image("lens.png")).await.unwrap();

    let mut shoppers = Vec::new();
    for i in 0..4 {
        let shopper = client(&server, StorageService::ephemeral());
        sign_up(&shopper, &format!("shopper{i}@example.com")).await;
        shopper.add_to_cart(last.product.id()).await.unwrap();
        shoppers.push(shopper);
    }

    let details = shipping();
    let results = futures::future::join_all(shoppers.iter().map(|s| s.checkout(&details))).await;
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| e.status() == Some(409)));
    assert_eq!(admin.product(last.product.id()).await.unwrap().product.stock(), Stock::new(0));
}

#[tokio::test]
async fn test_credential_survives_restart_and_401_signs_out() {
    let server = spawn_server().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");

    let first = client(&server, StorageService::open(&path).unwrap());
    sign_up(&first, "ana@example.com").await;
    let token = first.session().access_token().unwrap();

    let reopened = client(&server, StorageService::open(&path).unwrap());
    assert_eq!(reopened.session().access_token().as_deref(), Some(token.as_str()));
    assert_eq!(reopened.me().await.unwrap().email.as_str(), "ana@example.com");
    assert_eq!(first.storage().cookies.cookie("user_token").unwrap().value, token);

    first.logout().await.unwrap();
    assert!(!first.session().is_signed_in());

    let mut changes = reopened.session().subscribe();
    let err = reopened.me().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
    assert!(changes.has_changed().unwrap());
    assert!(changes.borrow_and_update().is_none());
    assert!(!reopened.session().is_signed_in());
    assert_eq!(reopened.resolve(Route::Orders), Route::Login);

    let after_restart = client(&server, StorageService::open(&path).unwrap());
    assert!(!after_restart.session().is_signed_in());
}

#[tokio::test]
async fn test_expired_session_during_checkout_routes_to_login() {
    let server = spawn_server().await;
    let admin = client(&server, StorageService::ephemeral());
    admin.login(&login("admin@techstore.test", "admin-pw")).await.unwrap();
    let cam = admin.create_product(&draft("Camera", 1000), Stock::new(5), image("camera.png")).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let shopper = client(&server, StorageService::open(&path).unwrap());
    sign_up(&shopper, "ana@example.com").await;
    shopper.add_to_cart(cam.product.id()).await.unwrap();

    // Same credential signed out from another window.
    let other_window = client(&server, StorageService::open(&path).unwrap());
    other_window.logout().await.unwrap();

    let flow = CheckoutFlow::new();
    let state = flow.submit(&shopper, &shipping()).await;
    assert!(matches!(state, CheckoutState::Failed(_)), "{state:?}");
    assert!(!shopper.session().is_signed_in());
    assert_eq!(flow.next_route(&shopper), Some(Route::Login));
    assert_eq!(shopper.cart().get().unwrap().item_count(), 1);
    assert_eq!(admin.product(cam.product.id()).await.unwrap().product.stock(), Stock::new(5));
}

/// Session store whose deletes always fail.
struct UndeletableStore(MemoryStore);

impl KeyValueStore for UndeletableStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> { self.0.get_raw(key) }
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> { self.0.set_raw(key, value) }
    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
    }
    fn clear(&self) -> Result<(), StorageError> { self.remove("") }
}

#[tokio::test]
async fn test_placed_order_succeeds_even_if_cart_cannot_be_cleared() {
    let server = spawn_server().await;
    let admin = client(&server, StorageService::ephemeral());
    admin.login(&login("admin@techstore.test", "admin-pw")).await.unwrap();
    let cam = admin.create_product(&draft("Camera", 1000), Stock::new(5), image("camera.png")).await.unwrap();

    let storage = StorageService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(UndeletableStore(MemoryStore::new())),
        Arc::new(CookieJar::new()),
    );
    let shopper = client(&server, storage);
    sign_up(&shopper, "ana@example.com").await;
    shopper.add_to_cart(cam.product.id()).await.unwrap();

    let flow = CheckoutFlow::new();
    let CheckoutState::Succeeded(order_id) = flow.submit(&shopper, &shipping()).await else { panic!("order should be placed") };
    assert_eq!(flow.next_route(&shopper), Some(Route::Orders));
    assert_eq!(shopper.my_order(order_id).await.unwrap().items.len(), 1);
    assert_eq!(admin.product(cam.product.id()).await.unwrap().product.stock(), Stock::new(4));
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = StorefrontClient::new(reqwest::Client::new(), &format!("http://{addr}"), StorageService::ephemeral());
    let err = client.products(&ProductQuery::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Connection(_)));
    assert!(err.to_string().starts_with("unable to connect"));
}

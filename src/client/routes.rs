//! Hash-route table and access guards.

use std::fmt;

use crate::domain::value_objects::{OrderId, ProductId, Role, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Contact,
    Product(ProductId),
    Cart,
    Checkout,
    Orders,
    Order(OrderId),
    Profile,
    Login,
    Register,
    AdminProducts,
    AdminProductCreate,
    AdminProductEdit(ProductId),
    AdminUsers,
    AdminUser(UserId),
    AdminOrders,
    AdminOrder(OrderId),
    AdminInventory,
    AdminInventoryItem(ProductId),
}

/// Who may open a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Anonymous,
    /// Only when no one is signed in.
    GuestOnly,
    Authenticated,
    /// Signed in with the client role.
    ClientOnly,
    AdminOnly,
}

impl Route {
    pub const fn access(&self) -> Access {
        match self {
            Self::Home | Self::Contact | Self::Product(_) | Self::Cart => Access::Anonymous,
            Self::Login | Self::Register => Access::GuestOnly,
            Self::Profile | Self::Orders | Self::Order(_) => Access::Authenticated,
            Self::Checkout => Access::ClientOnly,
            Self::AdminProducts
            | Self::AdminProductCreate
            | Self::AdminProductEdit(_)
            | Self::AdminUsers
            | Self::AdminUser(_)
            | Self::AdminOrders
            | Self::AdminOrder(_)
            | Self::AdminInventory
            | Self::AdminInventoryItem(_) => Access::AdminOnly,
        }
    }

    /// Parses a hash path such as `#/products/<id>`. Unknown paths yield `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.trim_start_matches('#').trim_matches('/');
        let segments: Vec<&str> = if path.is_empty() { Vec::new() } else { path.split('/').collect() };
        let route = match segments.as_slice() {
            [] => Self::Home,
            ["contact"] => Self::Contact,
            ["products", id] => Self::Product(id.parse().ok()?),
            ["cart"] => Self::Cart,
            ["checkout"] => Self::Checkout,
            ["orders"] => Self::Orders,
            ["orders", id] => Self::Order(id.parse().ok()?),
            ["profile"] => Self::Profile,
            ["auth", "login"] => Self::Login,
            ["auth", "register"] => Self::Register,
            ["admin", "products"] => Self::AdminProducts,
            ["admin", "products", "create"] => Self::AdminProductCreate,
            ["admin", "products", "edit", id] => Self::AdminProductEdit(id.parse().ok()?),
            ["admin", "users"] => Self::AdminUsers,
            ["admin", "users", "details", id] => Self::AdminUser(id.parse().ok()?),
            ["admin", "orders"] => Self::AdminOrders,
            ["admin", "orders", id] => Self::AdminOrder(id.parse().ok()?),
            ["admin", "inventory"] => Self::AdminInventory,
            ["admin", "inventory", id] => Self::AdminInventoryItem(id.parse().ok()?),
            _ => return None,
        };
        Some(route)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("/"),
            Self::Contact => f.write_str("/contact"),
            Self::Product(id) => write!(f, "/products/{id}"),
            Self::Cart => f.write_str("/cart"),
            Self::Checkout => f.write_str("/checkout"),
            Self::Orders => f.write_str("/orders"),
            Self::Order(id) => write!(f, "/orders/{id}"),
            Self::Profile => f.write_str("/profile"),
            Self::Login => f.write_str("/auth/login"),
            Self::Register => f.write_str("/auth/register"),
            Self::AdminProducts => f.write_str("/admin/products"),
            Self::AdminProductCreate => f.write_str("/admin/products/create"),
            Self::AdminProductEdit(id) => write!(f, "/admin/products/edit/{id}"),
            Self::AdminUsers => f.write_str("/admin/users"),
            Self::AdminUser(id) => write!(f, "/admin/users/details/{id}"),
            Self::AdminOrders => f.write_str("/admin/orders"),
            Self::AdminOrder(id) => write!(f, "/admin/orders/{id}"),
            Self::AdminInventory => f.write_str("/admin/inventory"),
            Self::AdminInventoryItem(id) => write!(f, "/admin/inventory/{id}"),
        }
    }
}

/// Where a navigation to `route` ends up for a visitor with `role`
/// (`None` when signed out).
pub fn resolve(route: Route, role: Option<Role>) -> Route {
    let allowed = match (route.access(), role) {
        (Access::Anonymous, _) => true,
        (Access::GuestOnly, role) => role.is_none(),
        (Access::Authenticated, role) => role.is_some(),
        (Access::ClientOnly, role) => role == Some(Role::Client),
        (Access::AdminOnly, role) => role == Some(Role::Admin),
    };
    match (allowed, role) {
        (true, _) => route,
        (false, None) => Route::Login,
        (false, Some(_)) => Route::Home,
    }
}

/// Application name
pub const APP_NAME: &str = "Vitrine";

/// Remote collection holding catalog products
pub const PRODUCTS_COLLECTION: &str = "products";

/// Remote collection holding user records
pub const USERS_COLLECTION: &str = "users";

/// Pseudo-category that disables category filtering
pub const ALL_CATEGORY: &str = "All";

/// Remote field carrying the admin entitlement
pub const ADMIN_FIELD: &str = "isAdmin";

/// Default interval between remote collection polls, in seconds
pub const DEFAULT_POLL_SECS: u64 = 5;

/// Minimum accepted password length at registration
pub const MIN_PASSWORD_LEN: usize = 6;

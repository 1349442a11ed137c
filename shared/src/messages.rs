//! User-facing messages shared by the service and its clients.

pub const INVALID_STOCK_VALUE: &str = "Invalid stock, minStock or maxStock value";
pub const PRODUCT_ID_REQUIRED: &str = "Product ID is required";
pub const INVALID_STOCK_OR_RESERVED_STOCK: &str = "Invalid stock or reservedStock value";
pub const STOCK_OR_RESERVED_STOCK_REQUIRED: &str =
    "At least one of stock or reservedStock must be provided";
pub const RESERVED_EXCEEDS_STOCK: &str = "reservedStock cannot exceed stock";
pub const INVALID_PRODUCT_DATA: &str = "Invalid productId, stock or reservedStock value";
pub const INVALID_PRODUCT_ID_OR_QUANTITY: &str = "Invalid product id or quantity";
pub const INVALID_PAGINATION: &str = "limit and page must be positive";
pub const HOLDER_ID_REQUIRED: &str = "User ID is required";
pub const HOLDER_ID_REQUIRED_RESERVE: &str = "User ID is required to reserve stock";
pub const HOLDER_ID_REQUIRED_RELEASE: &str = "User ID is required to release reserved stock";
pub const HOLDER_ID_REQUIRED_DEDUCT: &str = "User ID is required to deduct stock";
pub const HOLDER_ID_REQUIRED_LOOKUP: &str = "User ID is required to read a reservation";

pub const PRODUCT_NOT_FOUND: &str = "Product not found";
pub const RESERVATION_NOT_FOUND: &str = "No active reservation";

pub const AUTHORIZATION_REQUIRED: &str = "Authorization token is required";
pub const INVALID_TOKEN: &str = "Invalid authorization token";
pub const TOO_MANY_REQUESTS: &str = "Too many requests from this IP, please try again later.";
pub const INTERNAL_ERROR: &str = "Internal server error";

pub const STOCK_RESERVED: &str = "Stock reserved successfully";
pub const RESERVED_STOCK_RELEASED: &str = "Reserved stock released successfully";
pub const STOCK_DEDUCTED: &str = "Stock deducted successfully";
pub const CRON_JOB_EXECUTED: &str = "Cron job executed successfully";

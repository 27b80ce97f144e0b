//! Column-name constants for the observation table.
//!
//! The upstream feature-engineering pipeline produces one flat row per
//! (restaurant_id, date). Everything the engine reads by name is listed
//! here so schema drift shows up in one place.

/// Row key: restaurant identifier.
pub const RESTAURANT_ID: &str = "restaurant_id";
/// Row key: observation date (YYYY-MM-DD).
pub const DATE: &str = "date";

/// Realized daily sales across platforms (IDR). Model target; never a feature.
pub const TOTAL_SALES: &str = "total_sales";
/// Completed orders across platforms.
pub const ORDERS_COUNT: &str = "orders_count";

/// Advertising spend per platform and combined (IDR).
pub const GRAB_ADS_SPEND: &str = "grab_ads_spend";
pub const GOJEK_ADS_SPEND: &str = "gojek_ads_spend";
pub const ADS_SPEND: &str = "ads_spend";
/// Revenue attributed to ads (IDR).
pub const ADS_SALES: &str = "ads_sales";

/// Operational timing metrics, minutes.
pub const PREPARATION_TIME: &str = "preparation_time";
pub const DELIVERY_TIME: &str = "delivery_time";
pub const ACCEPTING_TIME: &str = "accepting_time";
pub const DRIVER_WAITING: &str = "driver_waiting";

/// Platform unavailability, minutes per day.
pub const OFFLINE_MINUTES: &str = "offline_minutes";
pub const CLOSE_MINUTES: &str = "close_minutes";

/// Order failures and service quality.
pub const CANCELLED_ORDERS: &str = "cancelled_orders";
pub const RATING: &str = "rating";

/// External covariates.
pub const RAIN_MM: &str = "rain_mm";
pub const TEMP_C: &str = "temp_c";
pub const IS_HOLIDAY: &str = "is_holiday";
pub const IS_WEEKEND: &str = "is_weekend";
/// Categorical weekday name produced by the calendar join.
pub const DAY_OF_WEEK: &str = "day_of_week";

/// Rain at or above this many millimetres counts as a heavy-rain day.
pub const HEAVY_RAIN_MM: f64 = 10.0;

pub mod prepare_env;

pub use prepare_env::{force_order_state, prepare_test_env, product_stock, random_db_path, seed_coupon, seed_product};

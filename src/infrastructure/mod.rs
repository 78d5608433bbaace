//! 基础设施层：唯一持有浏览器资源的地方

pub mod chrome_driver;
pub mod session_driver;

pub use chrome_driver::{ChromeDriver, DriverTimings};
pub use session_driver::{Selector, SessionDriver, SessionHandle};

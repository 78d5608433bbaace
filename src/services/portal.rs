use std::time::Duration;

/// 门户地址与时序参数
#[derive(Debug, Clone)]
pub struct PortalSettings {
    pub suizo_login_url: String,
    pub monroe_login_url: String,
    pub monroe_dashboard_url: String,
    /// 未配置时 Del Sud 登录不可用
    pub delsud_portal_url: Option<String>,
    /// 等待关键元素（登录成功标志、结果表）的时间
    pub element_timeout: Duration,
    pub download_timeout: Duration,
    /// 点击之后等待页面稳定
    pub settle_delay: Duration,
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            suizo_login_url: "https://web1.suizoargentina.com/login".to_string(),
            monroe_login_url: "https://www.monroeamericana.com.ar/apps/login/ext/index.html"
                .to_string(),
            monroe_dashboard_url:
                "https://www.monroeamericana.com.ar/apps/masaWeb/r6en1/index.html#bienvenido.html"
                    .to_string(),
            delsud_portal_url: None,
            element_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(60),
            settle_delay: Duration::from_millis(1000),
        }
    }
}

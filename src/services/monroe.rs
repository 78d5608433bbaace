//! Monroe Americana 门户（masaWeb）
//!
//! 优先复用已有的登录状态（上次执行保存的 cookies）；被重定向到登录页时才提交凭据。
//! 登录后进入 "Comprobantes emitidos" 并设置 60 天查询区间，之后每张发票只需在表格里搜索。

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::error::{AdapterError, AdapterResult, DriverError};
use crate::infrastructure::{Selector, SessionDriver, SessionHandle};
use crate::models::{Credentials, ProviderId};
use crate::services::adapter::{
    before_submit, first_visible, save_as_txt, settle, ProviderAdapter, RowReference, SearchResult,
};
use crate::services::portal::PortalSettings;

const LOGIN_PATH: &str = "/apps/login/ext/";
const DASHBOARD_MARKER: &str = "masaWeb";
const PERIOD_DAYS: i64 = 60;

const EXPORT_MODAL: &str = "//div[contains(@class, 'modal') and contains(@class, 'show')]";

/// 查询区间：昨天往前推到今天减 60 天，格式 `DD/MM/YYYY - DD/MM/YYYY`
pub fn period_range(today: NaiveDate) -> String {
    let end = today - ChronoDuration::days(1);
    let start = today - ChronoDuration::days(PERIOD_DAYS);
    format!("{} - {}", start.format("%d/%m/%Y"), end.format("%d/%m/%Y"))
}

pub struct MonroeAdapter {
    login_url: String,
    dashboard_url: String,
    settings: PortalSettings,
}

impl MonroeAdapter {
    pub fn new(settings: &PortalSettings) -> Self {
        Self {
            login_url: settings.monroe_login_url.clone(),
            dashboard_url: settings.monroe_dashboard_url.clone(),
            settings: settings.clone(),
        }
    }

    fn search_box() -> Selector {
        Selector::css(r#"input[type="search"]"#)
    }

    fn is_login_page(url: &str) -> bool {
        url.to_lowercase().contains(LOGIN_PATH)
    }

    async fn ensure_session(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
    ) -> AdapterResult<()> {
        let url = driver.current_url(handle).await?;
        if Self::is_login_page(&url) {
            warn!("[Monroe] 会话已失效，被重定向到登录页");
            return Err(AdapterError::SessionInvalid);
        }
        Ok(())
    }

    async fn submit_credentials(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        credentials: &Credentials,
    ) -> AdapterResult<()> {
        let user = Selector::css("#pUser");
        if !Self::is_login_page(&driver.current_url(handle).await?) {
            driver
                .navigate(handle, &self.login_url)
                .await
                .map_err(before_submit)?;
        }
        driver
            .wait_for(handle, &user, self.settings.element_timeout)
            .await
            .map_err(before_submit)?;

        driver
            .fill(handle, &user, &credentials.username)
            .await
            .map_err(before_submit)?;
        driver
            .fill(handle, &Selector::css(r#"input[type="password"]"#), &credentials.password)
            .await
            .map_err(before_submit)?;
        driver
            .click(handle, &Selector::text("button", "Iniciar"))
            .await
            .map_err(before_submit)?;
        settle(self.settings.settle_delay).await;

        if driver
            .is_visible(handle, &Selector::exact_text("Error de Credenciales"))
            .await?
        {
            return Err(AdapterError::login_failed("portal answered 'Error de Credenciales'"));
        }
        if driver
            .is_visible(handle, &Selector::exact_text("Para una mayor seguridad"))
            .await?
        {
            return Err(AdapterError::login_unavailable(
                "portal requires a captcha, log in once in the shared browser profile",
            ));
        }
        Ok(())
    }

    async fn verify_dashboard(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
    ) -> AdapterResult<bool> {
        let url = driver.current_url(handle).await?;
        debug!("[Monroe] 当前 URL: {}", url);
        if url.contains(DASHBOARD_MARKER) && !Self::is_login_page(&url) {
            return Ok(true);
        }
        if Self::is_login_page(&url) {
            return Ok(false);
        }

        let indicators = [
            Selector::exact_text("Bienvenido"),
            Selector::exact_text("Comprobantes emitidos"),
            Selector::exact_text("Estado de Cuenta"),
            Selector::exact_text("Cerrar Sesión"),
        ];
        Ok(first_visible(driver, handle, &indicators).await?.is_some())
    }

    /// 打开 Comprobantes emitidos 并设置查询区间
    async fn prepare_listing(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
    ) -> AdapterResult<()> {
        let unavailable = |e: DriverError| AdapterError::login_unavailable(format!(
            "cannot open 'Comprobantes emitidos': {}",
            e
        ));

        driver
            .click(handle, &Selector::exact_text("Comprobantes emitidos"))
            .await
            .map_err(unavailable)?;
        driver
            .wait_for(
                handle,
                &Selector::exact_text("Detalle de Emisiones"),
                self.settings.element_timeout,
            )
            .await
            .map_err(unavailable)?;

        let period = period_range(Local::now().date_naive());
        info!("[Monroe] 设置查询区间 {}", period);

        let period_buttons = [
            Selector::text("button", "Período"),
            Selector::text("button", "Periodo"),
        ];
        let button = first_visible(driver, handle, &period_buttons)
            .await?
            .cloned()
            .unwrap_or_else(|| Selector::text("button", "Período"));
        driver.click(handle, &button).await.map_err(unavailable)?;
        settle(self.settings.settle_delay).await;

        driver
            .fill(handle, &Selector::css("#masa-datepicker-input"), &period)
            .await
            .map_err(unavailable)?;
        driver
            .click(handle, &Selector::css("#masa-modal-consultar"))
            .await
            .map_err(unavailable)?;
        settle(self.settings.settle_delay).await;
        Ok(())
    }

    async fn reset_selection(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        checkbox: &Selector,
    ) {
        if let Err(e) = driver.click(handle, checkbox).await {
            debug!("[Monroe] 取消勾选失败: {}", e);
        }
        if let Err(e) = driver.fill(handle, &Self::search_box(), "").await {
            debug!("[Monroe] 清空搜索框失败: {}", e);
        }
    }
}

#[async_trait]
impl ProviderAdapter for MonroeAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Monroe
    }

    fn persists_session(&self) -> bool {
        true
    }

    async fn login(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        credentials: &Credentials,
    ) -> AdapterResult<()> {
        info!("[Monroe] 打开面板 {}", self.dashboard_url);
        driver
            .navigate(handle, &self.dashboard_url)
            .await
            .map_err(before_submit)?;
        settle(self.settings.settle_delay).await;

        if self.verify_dashboard(driver, handle).await? {
            info!("[Monroe] ✓ 复用已有会话");
        } else {
            info!("[Monroe] 需要登录 {}", self.login_url);
            self.submit_credentials(driver, handle, credentials).await?;
            if !self.verify_dashboard(driver, handle).await? {
                return Err(AdapterError::login_failed(
                    "dashboard not reached after submitting credentials",
                ));
            }
            info!("[Monroe] ✓ 登录成功");
        }

        self.prepare_listing(driver, handle).await
    }

    async fn search_invoice(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        invoice_number: &str,
    ) -> AdapterResult<SearchResult> {
        self.ensure_session(driver, handle).await?;

        driver
            .wait_for(handle, &Selector::css("table"), self.settings.element_timeout)
            .await?;
        driver.fill(handle, &Self::search_box(), invoice_number).await?;
        settle(self.settings.settle_delay).await;

        let row = Selector::row_containing(invoice_number);
        if driver.is_visible(handle, &row).await? {
            info!("[Monroe] ✓ 找到发票 {}", invoice_number);
            Ok(SearchResult::Found(RowReference::new(invoice_number, row)))
        } else {
            self.ensure_session(driver, handle).await?;
            info!("[Monroe] 未找到发票 {}", invoice_number);
            Ok(SearchResult::NotFound)
        }
    }

    async fn download_document(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        row: &RowReference,
    ) -> AdapterResult<PathBuf> {
        self.ensure_session(driver, handle).await?;

        let checkbox = row.row_selector.descendant("input[@type='checkbox']");
        driver.click(handle, &checkbox).await?;

        driver
            .click(
                handle,
                &Selector::xpath("(//button[contains(normalize-space(.), 'Exportar')])[1]"),
            )
            .await?;
        driver
            .wait_for(handle, &Selector::xpath(EXPORT_MODAL), self.settings.element_timeout)
            .await?;

        driver
            .select_option(
                handle,
                &Selector::xpath(format!("({}//select)[1]", EXPORT_MODAL)),
                "Impositivo",
            )
            .await?;
        driver
            .select_option(
                handle,
                &Selector::xpath(format!("({}//select)[2]", EXPORT_MODAL)),
                "Delimitado x coma(,)",
            )
            .await?;

        let trigger = Selector::xpath(format!(
            "{}//button[contains(normalize-space(.), 'Exportar')]",
            EXPORT_MODAL
        ));
        let result = driver
            .download(handle, &trigger, self.settings.download_timeout)
            .await;

        let downloaded = match result {
            Ok(path) => path,
            Err(e) => {
                self.reset_selection(driver, handle, &checkbox).await;
                self.ensure_session(driver, handle).await?;
                return Err(e.into());
            }
        };

        let saved = save_as_txt(&downloaded, &row.invoice_number).await?;
        info!("[Monroe] ✓ 已下载 {}", saved.display());

        self.reset_selection(driver, handle, &checkbox).await;
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_range() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(period_range(today), "15/01/2024 - 14/03/2024");
    }

    #[test]
    fn test_login_page_detection() {
        assert!(MonroeAdapter::is_login_page(
            "https://www.monroeamericana.com.ar/apps/login/ext/index.html"
        ));
        assert!(!MonroeAdapter::is_login_page(
            "https://www.monroeamericana.com.ar/apps/masaWeb/r6en1/index.html#bienvenido.html"
        ));
    }
}

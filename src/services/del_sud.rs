//! Droguería Del Sud 门户
//!
//! 通用表单流程，门户地址由配置提供

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::error::{AdapterError, AdapterResult, DriverError};
use crate::infrastructure::{Selector, SessionDriver, SessionHandle};
use crate::models::{Credentials, ProviderId};
use crate::services::adapter::{
    before_submit, first_visible, save_as_txt, settle, ProviderAdapter, RowReference, SearchResult,
};
use crate::services::portal::PortalSettings;

const USER_INPUT: &str = r#"input[type="text"], input[type="email"]"#;
const PASSWORD_INPUT: &str = r#"input[type="password"]"#;
const SUBMIT: &str = r#"button[type="submit"], input[type="submit"]"#;
const TXT_LINK: &str = "*[self::a or self::button][contains(translate(normalize-space(.), 'txt', 'TXT'), 'TXT')]";

pub struct DelSudAdapter {
    portal_url: Option<String>,
    settings: PortalSettings,
}

impl DelSudAdapter {
    pub fn new(settings: &PortalSettings) -> Self {
        Self {
            portal_url: settings.delsud_portal_url.clone(),
            settings: settings.clone(),
        }
    }

    fn comprobantes_link() -> Selector {
        Selector::text("a", "Comprobantes")
    }
}

#[async_trait]
impl ProviderAdapter for DelSudAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::DelSud
    }

    async fn login(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        credentials: &Credentials,
    ) -> AdapterResult<()> {
        let Some(url) = self.portal_url.as_deref() else {
            return Err(AdapterError::login_unavailable("DELSUD_PORTAL_URL is not configured"));
        };
        info!("[Del Sud] 登录 {}", url);

        let user = Selector::css(USER_INPUT);
        driver
            .navigate(handle, url)
            .await
            .map_err(before_submit)?;
        driver
            .wait_for(handle, &user, self.settings.element_timeout)
            .await
            .map_err(before_submit)?;

        driver
            .fill(handle, &user, &credentials.username)
            .await
            .map_err(before_submit)?;
        driver
            .fill(handle, &Selector::css(PASSWORD_INPUT), &credentials.password)
            .await
            .map_err(before_submit)?;
        driver
            .click(handle, &Selector::css(SUBMIT))
            .await
            .map_err(before_submit)?;
        settle(self.settings.settle_delay).await;

        match driver
            .wait_for(handle, &Self::comprobantes_link(), self.settings.element_timeout)
            .await
        {
            Ok(()) => {
                info!("[Del Sud] ✓ 登录成功");
                Ok(())
            }
            Err(DriverError::ElementNotFound { .. }) => Err(AdapterError::login_failed(
                "'Comprobantes' link not shown after submitting credentials",
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn search_invoice(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        invoice_number: &str,
    ) -> AdapterResult<SearchResult> {
        if driver.is_visible(handle, &Selector::css(PASSWORD_INPUT)).await? {
            return Err(AdapterError::SessionInvalid);
        }

        driver.click(handle, &Self::comprobantes_link()).await?;
        settle(self.settings.settle_delay).await;

        let inputs = [
            Selector::css(r#"input[type="search"]"#),
            Selector::css(r#"input[name*="comprobante"]"#),
        ];
        let input = first_visible(driver, handle, &inputs)
            .await?
            .cloned()
            .unwrap_or_else(|| Selector::css(r#"input[type="text"]"#));
        driver.fill(handle, &input, invoice_number).await?;

        let search_button = Selector::text("button", "Buscar");
        if driver.is_visible(handle, &search_button).await? {
            driver.click(handle, &search_button).await?;
        }
        settle(self.settings.settle_delay).await;

        let row = Selector::row_containing(invoice_number);
        if driver.is_visible(handle, &row).await? {
            info!("[Del Sud] ✓ 找到发票 {}", invoice_number);
            Ok(SearchResult::Found(RowReference::new(invoice_number, row)))
        } else {
            info!("[Del Sud] 未找到发票 {}", invoice_number);
            Ok(SearchResult::NotFound)
        }
    }

    async fn download_document(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        row: &RowReference,
    ) -> AdapterResult<PathBuf> {
        let link = row.row_selector.descendant(TXT_LINK);
        if !driver.is_visible(handle, &link).await? {
            return Err(AdapterError::download_failed("no TXT available for this invoice"));
        }

        let downloaded = driver
            .download(handle, &link, self.settings.download_timeout)
            .await?;
        let saved = save_as_txt(&downloaded, &row.invoice_number).await?;
        info!("[Del Sud] ✓ 已下载 {}", saved.display());
        Ok(saved)
    }
}

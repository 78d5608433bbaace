//! Suizo Argentina 门户
//!
//! 登录 → Consultas → Mis Comprobantes → 按发票号查询 → 勾选 → 下载

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{AdapterError, AdapterResult, DriverError};
use crate::infrastructure::{Selector, SessionDriver, SessionHandle};
use crate::models::{Credentials, ProviderId};
use crate::services::adapter::{
    before_submit, first_visible, save_as_txt, settle, ProviderAdapter, RowReference, SearchResult,
};
use crate::services::portal::PortalSettings;

const USER_INPUT: &str = r#"input[placeholder="Usuario"]"#;
const PASSWORD_INPUT: &str = r#"input[placeholder="Contraseña"]"#;
const LOGIN_BUTTON: &str = "input.btn-login";

pub struct SuizoAdapter {
    login_url: String,
    settings: PortalSettings,
}

impl SuizoAdapter {
    pub fn new(settings: &PortalSettings) -> Self {
        Self {
            login_url: settings.suizo_login_url.clone(),
            settings: settings.clone(),
        }
    }

    fn consultas_menu() -> Selector {
        Selector::exact_text("Consultas")
    }

    /// 登录后的促销弹窗
    async fn dismiss_popup(&self, driver: &dyn SessionDriver, handle: &SessionHandle) {
        let close_buttons = [
            Selector::css("button.close"),
            Selector::css(".modal-close"),
            Selector::css(r#"[aria-label="Close"]"#),
            Selector::css(".popup-close"),
            Selector::text("button", "Cerrar"),
        ];

        match first_visible(driver, handle, &close_buttons).await {
            Ok(Some(button)) => {
                if driver.click(handle, button).await.is_ok() {
                    debug!("[Suizo] 弹窗已关闭");
                }
            }
            Ok(None) => {}
            Err(e) => debug!("[Suizo] 检查弹窗失败: {}", e),
        }
    }

    /// 确保停留在 Mis Comprobantes 页面
    async fn open_comprobantes(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
    ) -> AdapterResult<()> {
        if driver.current_url(handle).await?.contains("/login") {
            return Err(AdapterError::SessionInvalid);
        }
        if driver.is_visible(handle, &Selector::exact_text("Mi grupo")).await? {
            return Ok(());
        }

        driver.click(handle, &Self::consultas_menu()).await?;
        settle(self.settings.settle_delay).await;

        let candidates = [
            Selector::text("a", "Mis Comprobantes"),
            Selector::xpath("//*[contains(@class, 'card')][contains(normalize-space(.), 'Mis Comprobantes')]"),
            Selector::text("div", "Mis Comprobantes"),
        ];
        let target = first_visible(driver, handle, &candidates)
            .await?
            .cloned()
            .unwrap_or_else(|| Selector::exact_text("Mis Comprobantes"));
        driver.click(handle, &target).await?;
        settle(self.settings.settle_delay).await;
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for SuizoAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Suizo
    }

    async fn login(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        credentials: &Credentials,
    ) -> AdapterResult<()> {
        info!("[Suizo] 登录 {}", self.login_url);

        let user = Selector::css(USER_INPUT);
        driver
            .navigate(handle, &self.login_url)
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
            .click(handle, &Selector::css(LOGIN_BUTTON))
            .await
            .map_err(before_submit)?;
        settle(self.settings.settle_delay).await;

        self.dismiss_popup(driver, handle).await;

        match driver
            .wait_for(handle, &Self::consultas_menu(), self.settings.element_timeout)
            .await
        {
            Ok(()) => {
                info!("[Suizo] ✓ 登录成功");
                Ok(())
            }
            Err(DriverError::ElementNotFound { .. }) => Err(AdapterError::login_failed(
                "'Consultas' menu not shown after submitting credentials",
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
        self.open_comprobantes(driver, handle).await?;

        driver.click(handle, &Selector::exact_text("Mi grupo")).await?;
        driver.click(handle, &Selector::text("label", "Facturas")).await?;
        driver
            .click(handle, &Selector::exact_text("Por Número de comprobante"))
            .await?;

        let inputs = [
            Selector::css("#comprobante"),
            Selector::css(r#"input[name="comprobante"]"#),
        ];
        let input = first_visible(driver, handle, &inputs)
            .await?
            .cloned()
            .unwrap_or_else(|| Selector::css(r#"input[type="text"]"#));
        driver.fill(handle, &input, invoice_number).await?;

        driver.click(handle, &Selector::text("button", "Consultar")).await?;
        settle(self.settings.settle_delay).await;

        match driver
            .wait_for(
                handle,
                &Selector::exact_text("Comprobantes encontrados"),
                self.settings.element_timeout,
            )
            .await
        {
            Ok(()) => {
                info!("[Suizo] ✓ 找到发票 {}", invoice_number);
                Ok(SearchResult::Found(RowReference::new(
                    invoice_number,
                    Selector::row_containing(invoice_number),
                )))
            }
            Err(DriverError::ElementNotFound { .. }) => {
                info!("[Suizo] 未找到发票 {}", invoice_number);
                Ok(SearchResult::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn download_document(
        &self,
        driver: &dyn SessionDriver,
        handle: &SessionHandle,
        row: &RowReference,
    ) -> AdapterResult<PathBuf> {
        let checkbox = row.row_selector.descendant("input[@type='checkbox']");
        driver.click(handle, &checkbox).await?;

        let downloaded = driver
            .download(
                handle,
                &Selector::text("button", "Descargar seleccionados"),
                self.settings.download_timeout,
            )
            .await?;
        let saved = save_as_txt(&downloaded, &row.invoice_number).await?;
        info!("[Suizo] ✓ 已下载 {}", saved.display());

        // 回到列表，供下一张发票使用
        if let Err(e) = driver
            .click(handle, &Selector::text("a", "Mis Comprobantes"))
            .await
        {
            warn!("[Suizo] 返回 Mis Comprobantes 失败: {}", e);
        }
        settle(self.settings.settle_delay).await;

        Ok(saved)
    }
}

//! Gateway de notificaciones
//!
//! Envío best-effort de SMS al dueño del vehículo vía la API REST de Twilio.
//! Una falla de entrega se loguea y devuelve `false`: nunca se propaga como
//! error ni revierte una mutación del ledger.

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
use rust_decimal::Decimal;

use crate::config::environment::EnvironmentConfig;
use crate::models::vehicle::{FuelType, OwnerContact};
use crate::services::threshold_monitor::QuotaWarningLevel;

/// Mensajes que el motor de cuotas decide enviar
#[derive(Debug, Clone)]
pub enum QuotaNotification {
    /// Nueva asignación mensual otorgada (reset manual o sweep)
    NewAllocation {
        registration_number: String,
        allocated_liters: Decimal,
        period_label: String,
    },
    /// Cruce de umbral de saldo bajo o crítico
    LowQuotaWarning {
        registration_number: String,
        remaining_liters: Decimal,
        fuel_type: FuelType,
        level: QuotaWarningLevel,
    },
    /// Recibo de despacho en estación
    FuelTransaction {
        registration_number: String,
        fuel_type: FuelType,
        amount_liters: Decimal,
        station_name: String,
        remaining_liters: Decimal,
    },
}

impl QuotaNotification {
    /// Texto del SMS para cada plantilla
    pub fn sms_text(&self) -> String {
        match self {
            QuotaNotification::NewAllocation {
                registration_number,
                allocated_liters,
                period_label,
            } => format!(
                "New Fuel Quota: Your {} has been allocated {}L quota for {}. Happy driving!",
                registration_number,
                allocated_liters.round_dp(1),
                period_label
            ),
            QuotaNotification::LowQuotaWarning {
                registration_number,
                remaining_liters,
                fuel_type,
                level,
            } => format!(
                "Low Fuel Quota Alert: {} has only {}L {} remaining (below {}% threshold). Please refill soon!",
                registration_number,
                remaining_liters.round_dp(1),
                fuel_type,
                level.threshold_pct()
            ),
            QuotaNotification::FuelTransaction {
                registration_number,
                fuel_type,
                amount_liters,
                station_name,
                remaining_liters,
            } => format!(
                "Fuel Alert: {}L {} pumped at {} for {}. Remaining: {}L",
                amount_liters.round_dp(1),
                fuel_type,
                station_name,
                registration_number,
                remaining_liters.round_dp(1)
            ),
        }
    }
}

/// Gateway fire-and-forget: `true` = entregado, `false` = falló (no fatal)
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn notify(&self, contact: &OwnerContact, notification: QuotaNotification) -> bool;
}

/// Implementación sobre la API REST de Twilio, con modo mock para desarrollo
pub struct TwilioNotificationService {
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
    sms_enabled: bool,
    mock_mode: bool,
    client: reqwest::Client,
    phone_cleanup: Regex,
}

impl TwilioNotificationService {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from_number: config.twilio_phone_number.clone(),
            sms_enabled: config.sms_enabled,
            mock_mode: config.notification_mock_mode,
            client,
            phone_cleanup: Regex::new(r"[\s()\-]").expect("valid phone cleanup regex"),
        }
    }

    fn is_configured(&self) -> bool {
        self.account_sid.as_deref().map_or(false, |s| !s.trim().is_empty())
            && self.auth_token.as_deref().map_or(false, |s| !s.trim().is_empty())
            && self.from_number.as_deref().map_or(false, |s| !s.trim().is_empty())
    }

    /// Normalizar números de teléfono de Sri Lanka a formato internacional
    fn format_phone_number(&self, phone_number: &str) -> String {
        let cleaned = self.phone_cleanup.replace_all(phone_number, "").to_string();

        if let Some(rest) = cleaned.strip_prefix('0') {
            // 0771234567 -> +94771234567
            format!("+94{}", rest)
        } else if cleaned.starts_with("+94") {
            cleaned
        } else if let Some(rest) = cleaned.strip_prefix("94") {
            format!("+94{}", rest)
        } else if cleaned.len() == 9 {
            // Le falta el 0 inicial, ej. 771234567
            format!("+94{}", cleaned)
        } else {
            phone_number.to_string()
        }
    }

    async fn send_sms(&self, phone_number: &str, message: &str) -> bool {
        if !self.sms_enabled {
            log::info!("📴 SMS disabled in configuration");
            return false;
        }

        if self.mock_mode {
            log::info!("=== MOCK SMS ===");
            log::info!("To: {}", phone_number);
            log::info!("Message: {}", message);
            log::info!("SMS sent successfully (MOCK MODE)");
            return true;
        }

        if !self.is_configured() {
            log::error!("❌ Twilio not properly configured");
            return false;
        }

        // is_configured garantiza que estos existen
        let account_sid = self.account_sid.as_deref().unwrap_or_default();
        let auth_token = self.auth_token.as_deref().unwrap_or_default();
        let from_number = self.from_number.as_deref().unwrap_or_default();

        let formatted = self.format_phone_number(phone_number);
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            account_sid
        );

        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", account_sid, auth_token));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Basic {}", auth))
            .form(&[
                ("From", from_number),
                ("To", formatted.as_str()),
                ("Body", message),
            ])
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                log::info!("✅ SMS sent successfully to: {}", formatted);
                true
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                log::error!("❌ Failed to send SMS. Status: {} - {}", status, body);
                false
            }
            Err(e) => {
                log::error!("❌ Error sending SMS: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl NotificationGateway for TwilioNotificationService {
    async fn notify(&self, contact: &OwnerContact, notification: QuotaNotification) -> bool {
        let message = notification.sms_text();

        match contact.phone_number.as_deref() {
            Some(phone) if !phone.trim().is_empty() => self.send_sms(phone, &message).await,
            _ => {
                log::warn!("⚠️ No phone number provided for SMS notification");
                false
            }
        }
    }
}

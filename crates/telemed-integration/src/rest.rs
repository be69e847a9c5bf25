//! REST服务连接器
//!
//! 通过平台REST后端实现服务契约。连接器不做重试，重试与降级策略
//! 属于调用方。

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use telemed_core::{
    Appointment, Case, RescheduleRequest, Result, ScheduleRequest, TelemedError,
};
use tracing::debug;
use uuid::Uuid;

use crate::services::{AppointmentService, CaseService};

/// 服务端点配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub auth: ServiceAuth,
    pub timeout_seconds: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            auth: ServiceAuth::None,
            timeout_seconds: 30,
        }
    }
}

/// 认证方式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceAuth {
    None,
    BearerToken { token: String },
    ApiKey { key: String, header: Option<String> },
}

/// 为请求附加认证头
fn apply_auth(request: RequestBuilder, auth: &ServiceAuth) -> RequestBuilder {
    match auth {
        ServiceAuth::None => request,
        ServiceAuth::BearerToken { token } => request.bearer_auth(token),
        ServiceAuth::ApiKey { key, header } => {
            let header_name = header.as_deref().unwrap_or("X-API-Key");
            request.header(header_name, key)
        }
    }
}

/// 解析响应，404映射为NotFound，传输失败映射为Service，响应体格式
/// 不合法映射为Serialization
async fn parse_response<T: DeserializeOwned>(
    response: reqwest::Response,
    resource: &str,
) -> Result<T> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(TelemedError::NotFound(resource.to_string()));
    }
    if !response.status().is_success() {
        return Err(TelemedError::Service(format!(
            "request for {} failed with status {}",
            resource,
            response.status()
        )));
    }
    let body = response
        .text()
        .await
        .map_err(|e| TelemedError::Service(e.to_string()))?;
    let parsed = serde_json::from_str(&body)?;
    Ok(parsed)
}

fn build_client(config: &EndpointConfig) -> Result<Client> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout_seconds))
        .build()
        .map_err(|e| TelemedError::Service(e.to_string()))
}

/// REST病例服务
pub struct RestCaseService {
    config: EndpointConfig,
    client: Client,
}

impl RestCaseService {
    /// 创建REST病例服务
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("GET {}", url);
        apply_auth(self.client.get(url), &self.config.auth)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("POST {}", url);
        apply_auth(self.client.post(url), &self.config.auth)
    }

    async fn send_case(&self, request: RequestBuilder, resource: &str) -> Result<Case> {
        let response = request
            .send()
            .await
            .map_err(|e| TelemedError::Service(e.to_string()))?;
        parse_response(response, resource).await
    }
}

#[async_trait]
impl CaseService for RestCaseService {
    async fn get_case(&self, id: Uuid) -> Result<Case> {
        let request = self.get(&format!("/cases/{}", id));
        self.send_case(request, &format!("case {}", id)).await
    }

    async fn list_doctor_cases(&self, doctor_id: Uuid) -> Result<Vec<Case>> {
        let request = self.get(&format!("/doctors/{}/cases", doctor_id));
        let response = request
            .send()
            .await
            .map_err(|e| TelemedError::Service(e.to_string()))?;
        parse_response(response, &format!("cases of doctor {}", doctor_id)).await
    }

    async fn accept_case(&self, id: Uuid) -> Result<Case> {
        let request = self.post(&format!("/cases/{}/accept", id));
        self.send_case(request, &format!("case {}", id)).await
    }

    async fn reject_case(&self, id: Uuid, reason: &str) -> Result<Case> {
        let request = self
            .post(&format!("/cases/{}/reject", id))
            .json(&json!({ "reason": reason }));
        self.send_case(request, &format!("case {}", id)).await
    }

    async fn set_case_fee(&self, id: Uuid, fee: f64) -> Result<Case> {
        let request = self
            .post(&format!("/cases/{}/fee", id))
            .json(&json!({ "consultation_fee": fee }));
        self.send_case(request, &format!("case {}", id)).await
    }

    async fn start_consultation(&self, id: Uuid) -> Result<Case> {
        let request = self.post(&format!("/cases/{}/start", id));
        self.send_case(request, &format!("case {}", id)).await
    }

    async fn complete_consultation(&self, id: Uuid) -> Result<Case> {
        let request = self.post(&format!("/cases/{}/complete", id));
        self.send_case(request, &format!("case {}", id)).await
    }

    async fn finalize_report(&self, id: Uuid) -> Result<Case> {
        let request = self.post(&format!("/cases/{}/report/finalize", id));
        self.send_case(request, &format!("case {}", id)).await
    }

    async fn close_case(&self, id: Uuid) -> Result<Case> {
        let request = self.post(&format!("/cases/{}/close", id));
        self.send_case(request, &format!("case {}", id)).await
    }
}

/// REST预约服务
pub struct RestAppointmentService {
    config: EndpointConfig,
    client: Client,
}

impl RestAppointmentService {
    /// 创建REST预约服务
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("GET {}", url);
        apply_auth(self.client.get(url), &self.config.auth)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("POST {}", url);
        apply_auth(self.client.post(url), &self.config.auth)
    }

    async fn send_appointment(
        &self,
        request: RequestBuilder,
        resource: &str,
    ) -> Result<Appointment> {
        let response = request
            .send()
            .await
            .map_err(|e| TelemedError::Service(e.to_string()))?;
        parse_response(response, resource).await
    }
}

#[async_trait]
impl AppointmentService for RestAppointmentService {
    async fn get_appointment(&self, id: Uuid) -> Result<Appointment> {
        let request = self.get(&format!("/appointments/{}", id));
        self.send_appointment(request, &format!("appointment {}", id)).await
    }

    async fn get_active_appointment(&self, case_id: Uuid) -> Result<Option<Appointment>> {
        let request = self.get(&format!("/cases/{}/appointment", case_id));
        let response = request
            .send()
            .await
            .map_err(|e| TelemedError::Service(e.to_string()))?;

        // 没有活跃预约不是错误
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let appointment =
            parse_response(response, &format!("appointment of case {}", case_id)).await?;
        Ok(Some(appointment))
    }

    async fn schedule_appointment(&self, request: &ScheduleRequest) -> Result<Appointment> {
        let request = self.post("/appointments").json(request);
        self.send_appointment(request, "new appointment").await
    }

    async fn reschedule_appointment(
        &self,
        id: Uuid,
        request: &RescheduleRequest,
    ) -> Result<Appointment> {
        let request = self
            .post(&format!("/appointments/{}/reschedule", id))
            .json(request);
        self.send_appointment(request, &format!("appointment {}", id)).await
    }

    async fn cancel_appointment(&self, id: Uuid, reason: &str) -> Result<Appointment> {
        let request = self
            .post(&format!("/appointments/{}/cancel", id))
            .json(&json!({ "reason": reason }));
        self.send_appointment(request, &format!("appointment {}", id)).await
    }

    async fn complete_appointment(&self, id: Uuid) -> Result<Appointment> {
        let request = self.post(&format!("/appointments/{}/complete", id));
        self.send_appointment(request, &format!("appointment {}", id)).await
    }

    async fn mark_no_show(&self, id: Uuid) -> Result<Appointment> {
        let request = self.post(&format!("/appointments/{}/no-show", id));
        self.send_appointment(request, &format!("appointment {}", id)).await
    }

    async fn record_join(&self, id: Uuid) -> Result<Appointment> {
        let request = self.post(&format!("/appointments/{}/join", id));
        self.send_appointment(request, &format!("appointment {}", id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let config = EndpointConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..Default::default()
        };
        let service = RestCaseService::new(config).unwrap();
        assert_eq!(
            service.url("/cases/123"),
            "https://api.example.com/v1/cases/123"
        );
    }

    #[test]
    fn test_default_endpoint_config() {
        let config = EndpointConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080/api/v1");
        assert_eq!(config.timeout_seconds, 30);
        assert!(matches!(config.auth, ServiceAuth::None));
    }
}

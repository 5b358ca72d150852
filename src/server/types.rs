use serde::Deserialize;
use utoipa::IntoParams;

/// 搜索请求参数
///
/// 两个参数都按字符串接收，由接口自行校验，以便返回统一的错误格式
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// 搜索文本
    pub prompt: Option<String>,
    /// 返回的结果数量，默认为 10
    #[param(value_type = Option<u32>)]
    pub limit: Option<String>,
}

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EarningsQuery {
    /// `week`, `month` (default) or `year`
    pub range: Option<String>,
}

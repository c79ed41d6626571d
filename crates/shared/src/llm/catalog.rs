use crate::models::{ListModelsResponse, ModelInfo};

pub const DEFAULT_MODEL_ID: &str = "deepseek/deepseek-r1-0528-qwen3-8b:free";

const FALLBACK_LABEL: &str = "AI Model";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogModel {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub const MODEL_CATALOG: &[CatalogModel] = &[
    CatalogModel {
        id: DEFAULT_MODEL_ID,
        name: "DeepSeek R1 (Free)",
        description: "Fast and efficient",
    },
    CatalogModel {
        id: "meta-llama/llama-3.2-3b-instruct:free",
        name: "Llama 3.2 3B (Free)",
        description: "Balanced performance",
    },
    CatalogModel {
        id: "microsoft/phi-3-mini-128k-instruct:free",
        name: "Phi-3 Mini (Free)",
        description: "Compact and quick",
    },
    CatalogModel {
        id: "google/gemma-2-9b-it:free",
        name: "Gemma 2 9B (Free)",
        description: "Google's latest",
    },
];

pub fn find_model(id: &str) -> Option<&'static CatalogModel> {
    MODEL_CATALOG.iter().find(|model| model.id == id)
}

/// Compact label for a provider model id: `vendor/name:tier` becomes `name`.
pub fn short_label(model_id: &str) -> &str {
    model_id
        .split('/')
        .nth(1)
        .and_then(|rest| rest.split(':').next())
        .filter(|label| !label.is_empty())
        .unwrap_or(FALLBACK_LABEL)
}

pub fn list_models_response(default_model: &str) -> ListModelsResponse {
    ListModelsResponse {
        models: MODEL_CATALOG
            .iter()
            .map(|model| ModelInfo {
                id: model.id.to_string(),
                name: model.name.to_string(),
                description: model.description.to_string(),
            })
            .collect(),
        default_model: default_model.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_MODEL_ID, MODEL_CATALOG, find_model, list_models_response, short_label};

    #[test]
    fn default_model_is_first_catalog_entry() {
        assert_eq!(MODEL_CATALOG[0].id, DEFAULT_MODEL_ID);
        assert_eq!(
            find_model(DEFAULT_MODEL_ID).map(|model| model.name),
            Some("DeepSeek R1 (Free)")
        );
        assert!(find_model("unknown/model").is_none());
    }

    #[test]
    fn short_label_strips_vendor_and_tier() {
        assert_eq!(short_label(DEFAULT_MODEL_ID), "deepseek-r1-0528-qwen3-8b");
        assert_eq!(short_label("openai/gpt-4o"), "gpt-4o");
    }

    #[test]
    fn short_label_falls_back_without_vendor_segment() {
        assert_eq!(short_label("gpt-4o"), "AI Model");
        assert_eq!(short_label("vendor/:free"), "AI Model");
    }

    #[test]
    fn list_response_carries_all_models() {
        let response = list_models_response("google/gemma-2-9b-it:free");
        assert_eq!(response.models.len(), MODEL_CATALOG.len());
        assert_eq!(response.default_model, "google/gemma-2-9b-it:free");
    }
}

//! Built-in generator backed by a fixed template catalogue.
//!
//! Every project type gets the common templates, API and Web projects get
//! their own extras on top. Ids are derived from the slot index and the
//! template, so regenerating a project yields the same ids again.

use async_trait::async_trait;
use tracing::info;

use super::{GenerationProvider, ProviderError};
use crate::model::{ProjectType, TestDefinition};

/// Number of definitions produced per generation.
pub const TESTS_PER_GENERATION: usize = 6;

struct Template {
    slug: &'static str,
    name: &'static str,
    description: &'static str,
    code: &'static str,
}

const COMMON: &[Template] = &[
    Template {
        slug: "usage",
        name: "Usage Message Test",
        description: "Both programs print the same usage text when called without arguments",
        code: "run []\nexpect stdout contains \"usage\"\nexpect exit_code != 0",
    },
    Template {
        slug: "happy-path",
        name: "Happy Path Output Test",
        description: "Valid input produces identical output",
        code: "run [\"2\", \"+\", \"3\"]\nexpect stdout == \"5\"\nexpect exit_code == 0",
    },
    Template {
        slug: "invalid-input",
        name: "Invalid Input Test",
        description: "Malformed input is rejected the same way",
        code: "run [\"2\", \"+\"]\nexpect exit_code != 0\nexpect stderr not_empty",
    },
];

const API: &[Template] = &[
    Template {
        slug: "response-shape",
        name: "API Response Test",
        description: "Responses carry the same JSON structure",
        code: "request GET /items\nexpect status == 200\nexpect body.items is array",
    },
    Template {
        slug: "crud",
        name: "CRUD Operations Test",
        description: "Create, read and update behave identically",
        code: "request POST /items {\"name\": \"Test Item\"}\nexpect status == 201\nrequest GET /items/{id}\nexpect body.name == \"Test Item\"",
    },
];

const WEB: &[Template] = &[
    Template {
        slug: "button-click",
        name: "Button Click Test",
        description: "Button interactions trigger the same handlers",
        code: "load \"<button id=btn>Click</button>\"\nclick #btn\nexpect event click fired",
    },
    Template {
        slug: "form-submit",
        name: "Form Submit Test",
        description: "Form validation accepts and rejects the same values",
        code: "load form#signup\nfill email \"\"\nexpect invalid\nfill email \"test@example.com\"\nexpect valid",
    },
];

/// Deterministic generator for demos and offline use.
#[derive(Debug, Clone)]
pub struct TemplateGenerator {
    count: usize,
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self {
            count: TESTS_PER_GENERATION,
        }
    }
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(count: usize) -> Self {
        Self { count }
    }

    fn catalogue(project_type: ProjectType) -> Vec<&'static Template> {
        let extra: &[Template] = match project_type {
            ProjectType::Api => API,
            ProjectType::Web => WEB,
            ProjectType::Terminal => &[],
        };
        COMMON.iter().chain(extra.iter()).collect()
    }

    /// Definitions for `project_type`, slots numbered from 1.
    pub fn definitions(&self, project_type: ProjectType) -> Vec<TestDefinition> {
        let templates = Self::catalogue(project_type);
        (1..=self.count)
            .map(|slot| {
                let t = templates[slot % templates.len()];
                TestDefinition {
                    id: format!("test-{slot}-{}", t.slug),
                    name: t.name.to_string(),
                    description: t.description.to_string(),
                    full_code: t.code.to_string(),
                }
            })
            .collect()
    }
}

#[async_trait]
impl GenerationProvider for TemplateGenerator {
    async fn generate(
        &self,
        project_id: &str,
        project_type: ProjectType,
    ) -> Result<Vec<TestDefinition>, ProviderError> {
        let defs = self.definitions(project_type);
        info!(%project_id, kind = %project_type, count = defs.len(), "generated tests from templates");
        Ok(defs)
    }
}

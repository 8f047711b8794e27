use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::invoker::Handler;
use crate::response::Render;
use crate::template::{RawBinding, UriTemplate};
use crate::types::{
    ConfigError, ResourceDescriptor, ResourceTemplateDescriptor, ToolSchema, MIME_TEXT_PLAIN,
};

/// Resource definition: a template plus listing metadata and presentation.
#[derive(Debug, Clone)]
pub struct ResourceDef {
    pub name: String,
    pub description: String,
    pub mime_type: String,
    pub template: UriTemplate,
    pub render: Render,
}

impl ResourceDef {
    pub fn new(name: impl Into<String>, template: UriTemplate) -> Self {
        ResourceDef {
            name: name.into(),
            description: String::new(),
            mime_type: MIME_TEXT_PLAIN.into(),
            template,
            render: Render::Plain,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Render numeric outcomes as `label: x op y = result`.
    pub fn expression(mut self, label: impl Into<String>, operator: impl Into<String>) -> Self {
        self.render = Render::Expression {
            label: label.into(),
            operator: operator.into(),
        };
        self
    }
}

pub struct ResourceEntry {
    pub def: ResourceDef,
    pub handler: Arc<dyn Handler>,
}

pub struct ToolEntry {
    pub schema: ToolSchema,
    pub handler: Arc<dyn Handler>,
}

/// Collects registrations before serving. [`freeze()`](RegistryBuilder::freeze)
/// consumes the builder, so nothing can be registered afterwards.
#[derive(Default)]
pub struct RegistryBuilder {
    resources: Vec<ResourceEntry>,
    tools: Vec<ToolEntry>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_resource(&mut self, def: ResourceDef, handler: Arc<dyn Handler>) -> &mut Self {
        self.resources.push(ResourceEntry { def, handler });
        self
    }

    pub fn register_tool(&mut self, schema: ToolSchema, handler: Arc<dyn Handler>) -> &mut Self {
        self.tools.push(ToolEntry { schema, handler });
        self
    }

    /// Validate every registration and produce the read-only registry.
    pub fn freeze(self) -> Result<Registry, ConfigError> {
        let mut resource_names = HashSet::new();
        for entry in &self.resources {
            if !resource_names.insert(entry.def.name.as_str()) {
                return Err(ConfigError::DuplicateResource(entry.def.name.clone()));
            }
        }

        for (i, a) in self.resources.iter().enumerate() {
            for b in &self.resources[i + 1..] {
                let (ta, tb) = (&a.def.template, &b.def.template);
                if ta.overlaps(tb) && ta.slot_count() == tb.slot_count() {
                    return Err(ConfigError::AmbiguousTemplates {
                        first: ta.to_string(),
                        second: tb.to_string(),
                    });
                }
            }
        }

        let mut tool_index = HashMap::with_capacity(self.tools.len());
        for (i, entry) in self.tools.iter().enumerate() {
            let schema = &entry.schema;
            if tool_index.insert(schema.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateTool(schema.name.clone()));
            }
            let mut params = HashSet::new();
            for param in &schema.params {
                if !params.insert(param.name.as_str()) {
                    return Err(ConfigError::InvalidSchema {
                        tool: schema.name.clone(),
                        reason: format!("duplicate parameter \"{}\"", param.name),
                    });
                }
            }
        }

        // Fewest slots first; stable, so registration order breaks ties
        // between templates that cannot overlap anyway.
        let mut match_order: Vec<usize> = (0..self.resources.len()).collect();
        match_order.sort_by_key(|&i| self.resources[i].def.template.slot_count());

        tracing::info!(
            resources = self.resources.len(),
            tools = self.tools.len(),
            "registry frozen"
        );

        Ok(Registry {
            resources: self.resources,
            match_order,
            tools: self.tools,
            tool_index,
        })
    }
}

/// Frozen set of resource templates and tools. Immutable, so it can be
/// shared across connections without locking.
pub struct Registry {
    resources: Vec<ResourceEntry>,
    match_order: Vec<usize>,
    tools: Vec<ToolEntry>,
    tool_index: HashMap<String, usize>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Templates structurally matching `uri`, most specific first.
    pub fn lookup_resource<'a>(
        &'a self,
        uri: &'a str,
    ) -> impl Iterator<Item = (&'a ResourceEntry, Vec<RawBinding<'a>>)> + 'a {
        self.match_order.iter().filter_map(move |&i| {
            let entry = &self.resources[i];
            entry
                .def
                .template
                .match_uri(uri)
                .map(|bindings| (entry, bindings))
        })
    }

    pub fn lookup_tool(&self, name: &str) -> Option<&ToolEntry> {
        self.tool_index.get(name).map(|&i| &self.tools[i])
    }

    /// Resources in registration order.
    pub fn resources(&self) -> &[ResourceEntry] {
        &self.resources
    }

    /// Tools in registration order.
    pub fn tools(&self) -> &[ToolEntry] {
        &self.tools
    }

    /// `resources/list` entries: templates without slots.
    pub fn resource_descriptors(&self) -> Vec<ResourceDescriptor> {
        self.resources
            .iter()
            .filter(|e| !e.def.template.has_slots())
            .map(|e| ResourceDescriptor {
                uri: e.def.template.to_string(),
                name: e.def.name.clone(),
                description: e.def.description.clone(),
                mime_type: e.def.mime_type.clone(),
            })
            .collect()
    }

    /// `resources/templates/list` entries: templates with slots.
    pub fn template_descriptors(&self) -> Vec<ResourceTemplateDescriptor> {
        self.resources
            .iter()
            .filter(|e| e.def.template.has_slots())
            .map(|e| ResourceTemplateDescriptor {
                uri_template: e.def.template.to_string(),
                name: e.def.name.clone(),
                description: e.def.description.clone(),
                mime_type: e.def.mime_type.clone(),
            })
            .collect()
    }
}

//! Diagram tools: authoring and navigation on the agent's current diagram

use async_trait::async_trait;
use serde_json::json;

use super::{
    ArgSpec, ArgType, SideEffect, Tool, ToolArgs, ToolEnv, ToolOutput, ToolSpec, current_diagram,
};
use crate::agent::AgentContext;
use crate::c4::{DiagramView, NewElement};
use crate::types::Result;

fn view_summary(view: &DiagramView) -> String {
    let focus = view
        .focus_id
        .as_deref()
        .and_then(|id| view.element(id).map(|e| e.name.clone()))
        .unwrap_or_else(|| view.diagram_name.clone());
    format!(
        "{} view of '{}': {} elements, {} relations",
        view.level,
        focus,
        view.elements.len(),
        view.relations.len()
    )
}

pub struct CreateDiagram;

#[async_trait]
impl Tool for CreateDiagram {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "create_diagram",
            description: "Create a new C4 diagram rooted at a software system and make it current",
            args: vec![
                ArgSpec::required("system_name", ArgType::String, "Name of the system"),
                ArgSpec::optional("description", ArgType::String, "What the system does"),
            ],
            effect: SideEffect::MutatesDiagram,
        }
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let name = args.str("system_name")?;
        let id = env
            .diagrams
            .create_diagram(name, args.opt_str("description"))?;
        let root = env.diagrams.root_id(&id)?;
        let view = env.diagrams.view(&id)?;
        ctx.set_current_diagram(id.clone());

        Ok(ToolOutput::new(format!(
            "Created diagram '{}' ({}) with root system {}",
            name.trim(),
            id,
            root
        ))
        .with_data(json!({"diagram_id": id, "root_id": root}))
        .with_view(view))
    }
}

pub struct AddElement;

#[async_trait]
impl Tool for AddElement {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "add_element",
            description: "Add an element to the current diagram, one level below its parent",
            args: vec![
                ArgSpec::required("level", ArgType::Level, "C4 level of the new element"),
                ArgSpec::required("name", ArgType::String, "Element name"),
                ArgSpec::optional(
                    "kind",
                    ArgType::String,
                    "person, system, external_system, container, database, component, code",
                ),
                ArgSpec::optional(
                    "parent_id",
                    ArgType::String,
                    "Parent element id or unique name; omit only for context elements",
                ),
                ArgSpec::optional("technology", ArgType::String, "Implementation technology"),
                ArgSpec::optional("description", ArgType::String, "Responsibility"),
            ],
            effect: SideEffect::MutatesDiagram,
        }
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let diagram = current_diagram(ctx)?;
        let level = args.level("level")?;
        let name = args.str("name")?;

        let mut new = NewElement::new(level, name);
        if let Some(kind) = args.opt_str("kind") {
            new = new.kind(kind);
        }
        if let Some(parent) = args.opt_str("parent_id") {
            new = new.parent(parent);
        }
        if let Some(technology) = args.opt_str("technology") {
            new = new.technology(technology);
        }
        if let Some(description) = args.opt_str("description") {
            new = new.description(description);
        }

        let element_id = env.diagrams.add_element(&diagram, new)?;
        let view = env.diagrams.view(&diagram)?;

        Ok(ToolOutput::new(format!(
            "Added {} '{}' as {}",
            level,
            name.trim(),
            element_id
        ))
        .with_data(json!({"element_id": element_id}))
        .with_view(view))
    }
}

pub struct AddRelation;

#[async_trait]
impl Tool for AddRelation {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "add_relation",
            description: "Add a directed relation between two elements of the current diagram",
            args: vec![
                ArgSpec::required("source_id", ArgType::String, "Source element id or name"),
                ArgSpec::required("target_id", ArgType::String, "Target element id or name"),
                ArgSpec::required("label", ArgType::String, "What flows along the relation"),
                ArgSpec::optional("technology", ArgType::String, "Protocol or technology"),
            ],
            effect: SideEffect::MutatesDiagram,
        }
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let diagram = current_diagram(ctx)?;
        let source = args.str("source_id")?;
        let target = args.str("target_id")?;
        let label = args.str("label")?;

        let added = env.diagrams.add_relation(
            &diagram,
            source,
            target,
            label,
            args.opt_str("technology"),
        )?;
        let summary = if added {
            format!("Added relation {} -> {} ({})", source, target, label)
        } else {
            format!("Relation {} -> {} ({}) already exists", source, target, label)
        };

        Ok(ToolOutput::new(summary)
            .with_data(json!({"added": added}))
            .with_view(env.diagrams.view(&diagram)?))
    }
}

pub struct DrillDown;

#[async_trait]
impl Tool for DrillDown {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "drill_down",
            description: "Focus the current diagram on an element's children; defaults to the root system",
            args: vec![ArgSpec::optional(
                "element_id",
                ArgType::String,
                "Element id or unique name",
            )],
            effect: SideEffect::MutatesDiagram,
        }
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let diagram = current_diagram(ctx)?;
        let element = match args.opt_str("element_id") {
            Some(reference) => reference.to_string(),
            None => env.diagrams.root_id(&diagram)?,
        };

        let view = env.diagrams.drill_down(&diagram, &element)?;
        Ok(ToolOutput::new(view_summary(&view)).with_view(view))
    }
}

pub struct DrillUp;

#[async_trait]
impl Tool for DrillUp {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "drill_up",
            description: "Move the current diagram's focus to the parent of the focused element",
            args: vec![],
            effect: SideEffect::MutatesDiagram,
        }
    }

    async fn execute(
        &self,
        _args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let diagram = current_diagram(ctx)?;
        let view = env.diagrams.drill_up(&diagram)?;
        Ok(ToolOutput::new(view_summary(&view)).with_view(view))
    }
}

pub struct Highlight;

#[async_trait]
impl Tool for Highlight {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "highlight",
            description: "Highlight elements in the current view; cleared by the next navigation",
            args: vec![ArgSpec::required(
                "element_ids",
                ArgType::StringList,
                "Element ids or unique names",
            )],
            effect: SideEffect::MutatesDiagram,
        }
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let diagram = current_diagram(ctx)?;
        let ids = args.string_list("element_ids")?;
        let view = env.diagrams.highlight(&diagram, &ids)?;

        Ok(ToolOutput::new(format!(
            "Highlighted {} elements: {}",
            view.highlighted.len(),
            view.highlighted.join(", ")
        ))
        .with_view(view))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, env};
    use super::super::{ToolCall, ToolRegistry, ToolResult};
    use crate::agent::AgentContext;
    use crate::c4::C4Level;
    use crate::tools::ToolEnv;
    use crate::types::ErrorKind;

    async fn run(
        registry: &ToolRegistry,
        call: ToolCall,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> ToolResult {
        registry.dispatch(0, &call, ctx, env).await
    }

    #[tokio::test]
    async fn test_requires_current_diagram() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let env = env();
        let mut ctx = context();

        for call in [
            ToolCall::new("drill_up"),
            ToolCall::new("drill_down"),
            ToolCall::new("add_element").arg("level", "container").arg("name", "API"),
            ToolCall::new("highlight").arg("element_ids", vec!["el-1"]),
        ] {
            let result = run(&registry, call, &mut ctx, &env).await;
            assert_eq!(result.failure_kind(), Some(ErrorKind::InvalidState));
        }
    }

    #[tokio::test]
    async fn test_author_and_navigate() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let env = env();
        let mut ctx = context();

        let created = run(
            &registry,
            ToolCall::new("create_diagram").arg("system_name", "Shop"),
            &mut ctx,
            &env,
        )
        .await;
        assert!(created.is_success());
        assert!(ctx.current_diagram.is_some());

        let api = run(
            &registry,
            ToolCall::new("add_element")
                .arg("level", "container")
                .arg("name", "API")
                .arg("parent_id", "Shop")
                .arg("technology", "FastAPI"),
            &mut ctx,
            &env,
        )
        .await;
        assert_eq!(api.output().unwrap().data["element_id"], "el-2");

        run(
            &registry,
            ToolCall::new("add_element")
                .arg("level", "container")
                .arg("name", "Orders DB")
                .arg("kind", "database")
                .arg("parent_id", "el-1"),
            &mut ctx,
            &env,
        )
        .await;

        let relation = ToolCall::new("add_relation")
            .arg("source_id", "el-2")
            .arg("target_id", "el-3")
            .arg("label", "reads orders");
        let first = run(&registry, relation.clone(), &mut ctx, &env).await;
        let second = run(&registry, relation, &mut ctx, &env).await;
        assert_eq!(first.output().unwrap().data["added"], true);
        assert_eq!(second.output().unwrap().data["added"], false);

        let down = run(&registry, ToolCall::new("drill_down"), &mut ctx, &env).await;
        let view = down.output().unwrap().view.clone().unwrap();
        assert_eq!(view.level, C4Level::Container);
        assert_eq!(view.elements.len(), 2);
        assert_eq!(view.relations.len(), 1);

        let lit = run(
            &registry,
            ToolCall::new("highlight").arg("element_ids", vec!["API"]),
            &mut ctx,
            &env,
        )
        .await;
        assert_eq!(lit.output().unwrap().view.as_ref().unwrap().highlighted, vec!["el-2"]);

        let up = run(&registry, ToolCall::new("drill_up"), &mut ctx, &env).await;
        let view = up.output().unwrap().view.clone().unwrap();
        assert_eq!(view.level, C4Level::Context);
        assert!(view.highlighted.is_empty());
    }

    #[tokio::test]
    async fn test_skipped_level_is_invariant_violation() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let env = env();
        let mut ctx = context();
        run(
            &registry,
            ToolCall::new("create_diagram").arg("system_name", "Shop"),
            &mut ctx,
            &env,
        )
        .await;

        let result = run(
            &registry,
            ToolCall::new("add_element")
                .arg("level", "component")
                .arg("name", "X")
                .arg("parent_id", "Shop"),
            &mut ctx,
            &env,
        )
        .await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::InvariantViolation));
    }

    #[tokio::test]
    async fn test_highlight_unknown_marks_nothing() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let env = env();
        let mut ctx = context();
        run(
            &registry,
            ToolCall::new("create_diagram").arg("system_name", "Shop"),
            &mut ctx,
            &env,
        )
        .await;

        let result = run(
            &registry,
            ToolCall::new("highlight").arg("element_ids", vec!["el-1", "el-99"]),
            &mut ctx,
            &env,
        )
        .await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::NotFound));

        let diagram = ctx.current_diagram.clone().unwrap();
        assert!(env.diagrams.view(&diagram).unwrap().highlighted.is_empty());
    }
}

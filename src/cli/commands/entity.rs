//! Entity command implementations.

use colored::Colorize;
use serde_json::Value;

use super::{Context, block_on, print_json};
use crate::cli::EntityCommands;
use crate::error::{Error, Result};
use crate::notify::{Notifier, TerminalNotifier};
use crate::remote::{Entity, Mutation, Page, Query};

/// Execute entity commands.
pub fn execute(command: &EntityCommands, ctx: &Context) -> Result<()> {
    block_on(run(command, ctx))?
}

async fn run(command: &EntityCommands, ctx: &Context) -> Result<()> {
    let (client, _) = ctx.client()?;

    match command {
        EntityCommands::List {
            entity,
            filters,
            page,
        } => {
            let mut query_params = filters.clone();
            if let Some(page) = page {
                query_params.push(("page".to_string(), page.to_string()));
            }

            let list = Query::new(|params: Vec<(String, String)>| {
                let client = &client;
                async move { client.list_entities::<Value>(*entity, &params).await }
            });
            list.set_key(Some(query_params)).await;
            let page = list.state().into_result()?;

            if ctx.json {
                return print_json(&serde_json::json!({
                    "entity": entity.as_str(),
                    "total": page.total,
                    "items": page.items,
                }));
            }
            print_page(*entity, &page);
            Ok(())
        }

        EntityCommands::Show { entity, id } => {
            let detail = Query::new(|id: String| {
                let client = &client;
                async move { client.get_entity::<Value>(*entity, &id).await }
            });
            detail.set_key(Some(id.clone())).await;
            let record = detail.state().into_result()?;

            if ctx.json {
                return print_json(&record);
            }
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }

        EntityCommands::Transition {
            entity,
            id,
            action,
            data,
        } => {
            let body = match data {
                Some(raw) => serde_json::from_str(raw)
                    .map_err(|e| Error::InvalidArgument(format!("--data is not valid JSON: {e}")))?,
                None => Value::Object(serde_json::Map::new()),
            };

            let notifier = TerminalNotifier::new(ctx.quiet || ctx.json);
            let transition = Mutation::new(|body: Value| {
                let client = &client;
                async move { client.transition_entity(*entity, id, action, &body).await }
            });

            match transition.run(body).await {
                Ok(result) => {
                    notifier.success(&format!("{entity} {id}: {action} done"));
                    if ctx.json {
                        return print_json(&result);
                    }
                    if !ctx.quiet {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    }
                    Ok(())
                }
                Err(e) => {
                    notifier.error(&format!("{entity} {id}: {action} failed: {e}"));
                    Err(e)
                }
            }
        }
    }
}

fn label_of(item: &Value) -> String {
    ["reference", "number", "name", "code", "title"]
        .iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str))
        .unwrap_or("")
        .to_string()
}

fn print_page(entity: Entity, page: &Page<Value>) {
    for item in &page.items {
        let id = item.get("id").map(ToString::to_string).unwrap_or_default();
        let status = item.get("status").and_then(Value::as_str).unwrap_or("");
        println!("  {:>8}  {:<32} {}", id.bold(), label_of(item), status.dimmed());
    }

    match page.total {
        Some(total) => println!("\n{} of {total} {entity}", page.items.len()),
        None => println!("\n{} {entity}", page.items.len()),
    }
}

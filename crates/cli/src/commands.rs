use anyhow::Context;
use serde::Serialize;

use marginalia_client::AnnotationApi;
use marginalia_core::adapter::to_viewer_batch;
use marginalia_core::orphans::find_orphans_transitive;
use marginalia_core::query::AnnotationQuery;

use crate::Command;

pub async fn run(api: &AnnotationApi, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List {
            scope,
            page,
            per_page,
        } => {
            let mut query = match scope.scope() {
                Some(scope) => AnnotationQuery::for_scope(&scope),
                None => AnnotationQuery::new(),
            }
            .page(page);
            if let Some(per_page) = per_page {
                query = query.per_page(per_page);
            }

            let result = api.list(&query).await?;
            tracing::info!(
                returned = result.data.len(),
                total = ?result.total,
                page,
                "Listed annotations",
            );
            print_json(&result.data)
        }

        Command::Get { annotation_id } => {
            let annotation = api.get(&annotation_id).await?;
            print_json(&annotation)
        }

        Command::Delete { annotation_ids } => {
            match annotation_ids.as_slice() {
                [single] => api.delete(single).await?,
                many => api.bulk_delete(many).await?,
            }
            tracing::info!(count = annotation_ids.len(), "Deleted annotations");
            Ok(())
        }

        Command::Prune { scope, dry_run } => {
            let scope = scope.require()?;
            let rows = api.list_all(&scope).await?;
            let orphans = find_orphans_transitive(&rows);

            if orphans.is_empty() {
                tracing::info!(scope = %scope, checked = rows.len(), "No orphaned replies");
            } else if dry_run {
                tracing::info!(scope = %scope, count = orphans.len(), "Would remove orphaned replies");
            } else {
                api.bulk_delete(&orphans).await?;
                tracing::info!(scope = %scope, count = orphans.len(), "Removed orphaned replies");
            }
            print_json(&orphans)
        }

        Command::Export { scope, output } => {
            let scope = scope.require()?;
            let rows = api.list_all(&scope).await?;
            let json = serde_json::to_string_pretty(&to_viewer_batch(&rows))?;

            match output {
                Some(path) => {
                    tokio::fs::write(&path, json)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::info!(scope = %scope, count = rows.len(), path = %path.display(), "Exported annotations");
                }
                None => println!("{json}"),
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

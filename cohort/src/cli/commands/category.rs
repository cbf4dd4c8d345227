use crate::cli::CliContext;
use crate::cli::OutputFormatter;
use crate::error::GroupingResult;
use crate::model::GroupingPolicy;
use crate::partition::capacity_from_i64;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum CategoryCommand {
    /// Create a category and form its initial groups
    Create {
        /// Course ID
        course: String,

        /// Category name
        name: String,

        /// Grouping policy (random, free)
        #[arg(short, long, default_value = "random")]
        policy: GroupingPolicy,

        /// Capacity per group (defaults to engine.default_capacity)
        #[arg(long, allow_negative_numbers = true)]
        capacity: Option<i64>,
    },

    /// Show a category and its reconciled groups
    Show {
        /// Category ID
        id: String,
    },

    /// List the categories of a course
    List {
        /// Course ID
        course: String,
    },

    /// Change the capacity per group
    Capacity {
        /// Category ID
        id: String,

        /// New capacity per group
        #[arg(allow_negative_numbers = true)]
        capacity: i64,
    },

    /// Change the grouping policy (only while the category has no groups)
    Policy {
        /// Category ID
        id: String,

        /// New policy (random, free)
        policy: GroupingPolicy,
    },

    /// Delete a category and all of its groups
    Delete {
        /// Category ID
        id: String,
    },

    /// Check membership invariants without changing anything
    Audit {
        /// Category ID
        id: String,
    },

    /// List enrolled students that are in no group
    Unassigned {
        /// Course ID
        course: String,

        /// Category ID
        id: String,
    },
}

pub async fn execute(ctx: &mut CliContext, command: CategoryCommand) -> GroupingResult<()> {
    let formatter = OutputFormatter::new(ctx.output_format);
    let engine = ctx.engine()?;

    match command {
        CategoryCommand::Create {
            course,
            name,
            policy,
            capacity,
        } => {
            let capacity = match capacity {
                Some(value) => capacity_from_i64(value)?,
                None => ctx.config.engine.default_capacity,
            };
            let created = engine
                .create_category(&course, &name, policy, capacity)
                .await?;
            match created.formation {
                Ok(groups) => {
                    if formatter.is_json() {
                        formatter.json(&serde_json::json!({
                            "category": created.category,
                            "groups": groups,
                        }));
                    } else {
                        formatter.success(&format!(
                            "Created category {} with {} groups",
                            created.category.id,
                            groups.len()
                        ));
                        formatter.groups(&groups);
                    }
                }
                Err(e) => {
                    formatter.warning(&format!(
                        "Created category {} but group formation failed: {}",
                        created.category.id, e
                    ));
                    ctx.status("Run `cohort category show` to retry formation");
                }
            }
        }
        CategoryCommand::Show { id } => {
            let category = engine.get_category(&id).await?;
            let groups = engine.load_category_groups(&id).await?;
            if formatter.is_json() {
                formatter.json(&serde_json::json!({
                    "category": category,
                    "groups": groups,
                }));
            } else {
                formatter.category(&category);
                formatter.groups(&groups);
            }
        }
        CategoryCommand::List { course } => {
            let categories = engine.list_categories(&course).await?;
            if formatter.is_json() {
                formatter.json(&categories);
            } else if categories.is_empty() {
                formatter.success(&format!("No categories in {}", course));
            } else {
                formatter.categories(&categories);
            }
        }
        CategoryCommand::Capacity { id, capacity } => {
            let capacity = capacity_from_i64(capacity)?;
            let change = engine.update_capacity(&id, capacity).await?;
            if formatter.is_json() {
                formatter.json(&serde_json::json!({
                    "groups": change.groups,
                    "evicted": change.evicted,
                    "redistributed": change.redistributed,
                }));
            } else {
                formatter.success(&format!("Capacity of {} is now {}", id, capacity));
                formatter.capacity_change(&change);
            }
        }
        CategoryCommand::Policy { id, policy } => {
            let category = engine.update_policy(&id, policy).await?;
            formatter.success(&format!("Policy of {} is now {}", category.id, category.policy));
        }
        CategoryCommand::Delete { id } => {
            engine.delete_category(&id).await?;
            formatter.success(&format!("Deleted category {}", id));
        }
        CategoryCommand::Audit { id } => {
            let violations = engine.audit_category(&id).await?;
            if formatter.is_json() {
                formatter.json(&violations);
            } else {
                formatter.violations(&violations);
            }
        }
        CategoryCommand::Unassigned { course, id } => {
            let students = engine.students_without_group(&course, &id).await?;
            if formatter.is_json() {
                formatter.json(&students);
            } else if students.is_empty() {
                formatter.success("Every enrolled student has a group");
            } else {
                formatter.students("Students without a group", &students);
            }
        }
    }

    Ok(())
}

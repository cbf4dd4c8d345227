use crate::cli::CliContext;
use crate::cli::OutputFormatter;
use crate::error::GroupingResult;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Create an empty group
    Create {
        /// Category ID
        category: String,

        /// Group name (defaults to the next automatic name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete a group; its members become unassigned
    Delete {
        /// Group ID
        id: String,
    },

    /// Add a student to a group
    Add {
        /// Group ID
        group: String,

        /// Student ID
        student: String,
    },

    /// Remove a student from a group
    Remove {
        /// Group ID
        group: String,

        /// Student ID
        student: String,
    },

    /// Join a group as a student (FREE categories only)
    Join {
        /// Group ID
        group: String,

        /// Student ID
        student: String,
    },

    /// Leave a group as a student (FREE categories only)
    Leave {
        /// Group ID
        group: String,

        /// Student ID
        student: String,
    },
}

pub async fn execute(ctx: &mut CliContext, command: GroupCommand) -> GroupingResult<()> {
    let formatter = OutputFormatter::new(ctx.output_format);
    let engine = ctx.engine()?;

    let (message, group) = match command {
        GroupCommand::Create { category, name } => {
            let group = engine.create_manual_group(&category, name.as_deref()).await?;
            (format!("Created group {}", group.name), group)
        }
        GroupCommand::Delete { id } => {
            let group = engine.delete_group(&id).await?;
            if !group.is_empty() {
                ctx.status(&format!(
                    "{} students are now without a group",
                    group.len()
                ));
            }
            (format!("Deleted group {}", group.name), group)
        }
        GroupCommand::Add { group, student } => {
            let group = engine.add_member(&group, &student).await?;
            (format!("Added {} to {}", student, group.name), group)
        }
        GroupCommand::Remove { group, student } => {
            let group = engine.remove_member(&group, &student).await?;
            (format!("Removed {} from {}", student, group.name), group)
        }
        GroupCommand::Join { group, student } => {
            let group = engine.join_group(&student, &group).await?;
            (format!("{} joined {}", student, group.name), group)
        }
        GroupCommand::Leave { group, student } => {
            let group = engine.leave_group(&student, &group).await?;
            (format!("{} left {}", student, group.name), group)
        }
    };

    if formatter.is_json() {
        formatter.json(&group);
    } else {
        formatter.success(&message);
        formatter.group(&group);
    }

    Ok(())
}

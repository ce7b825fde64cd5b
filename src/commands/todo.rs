use clap::{Args, Subcommand};

use super::{confirm, truncate, OutputFormat};
use firestarter::Config;
use firestarter::db::{Constraint, Direction, CREATED_AT_FIELD};
use firestarter::{Document, DocumentService, Patch, Todo};

#[derive(Args)]
pub struct TodoCommand {
    /// User id to act as (defaults to the configured default_user)
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: TodoSubcommand,
}

#[derive(Subcommand)]
pub enum TodoSubcommand {
    /// Add one or more todos
    Add {
        /// Titles (each becomes a todo)
        #[arg(required = true)]
        titles: Vec<String>,

        /// Description, applied to every added todo
        #[arg(long)]
        description: Option<String>,
    },

    /// List todos, newest first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only show todos that are not completed
        #[arg(long)]
        open: bool,
    },

    /// Mark a todo as completed
    Done {
        /// Todo id
        id: String,
    },

    /// Delete a todo
    Remove {
        /// Todo id
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Delete all completed todos
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl TodoCommand {
    pub async fn run(
        &self,
        todos: &DocumentService<Todo>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let user_id = self.user.as_deref().unwrap_or(&config.default_user.value);

        match &self.command {
            TodoSubcommand::Add {
                titles,
                description,
            } => {
                let mut items = Vec::with_capacity(titles.len());
                for title in titles {
                    let mut todo = Todo::new(title, user_id);
                    if let Some(description) = description {
                        todo = todo.with_description(description);
                    }
                    todo.validate()?;
                    items.push(todo);
                }

                let ids = todos.batch_create(&items).await?;
                for (id, todo) in ids.iter().zip(&items) {
                    println!("Added {}  {}", id, todo.title);
                }
                Ok(())
            }

            TodoSubcommand::List { format, open } => {
                let mut constraints = vec![Constraint::eq("userId", user_id)];
                if *open {
                    constraints.push(Constraint::eq("completed", false));
                }
                constraints.push(Constraint::order_by(CREATED_AT_FIELD, Direction::Desc));
                let items = todos.get_all(&constraints).await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    }
                    OutputFormat::Text => {
                        if items.is_empty() {
                            println!("No todos found");
                            return Ok(());
                        }
                        print_table(&items);
                    }
                }
                Ok(())
            }

            TodoSubcommand::Done { id } => {
                let todo = find_todo(todos, id, user_id).await?;
                todos
                    .update(&todo.id, Patch::new().set("completed", true))
                    .await?;
                println!("Completed: {}", todo.title);
                Ok(())
            }

            TodoSubcommand::Remove { id, force } => {
                let todo = find_todo(todos, id, user_id).await?;

                if !force && !confirm(&format!("Delete todo '{}'?", todo.title))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                todos.delete(&todo.id).await?;
                println!("Deleted todo: {}", todo.title);
                Ok(())
            }

            TodoSubcommand::Clear { force } => {
                let done = todos
                    .get_all(&[
                        Constraint::eq("userId", user_id),
                        Constraint::eq("completed", true),
                    ])
                    .await?;

                if done.is_empty() {
                    println!("No completed todos");
                    return Ok(());
                }
                if !force && !confirm(&format!("Delete {} completed todo(s)?", done.len()))? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }

                let ids: Vec<String> = done.into_iter().map(|doc| doc.id).collect();
                todos.batch_delete(&ids).await?;
                println!("Deleted {} completed todo(s)", ids.len());
                Ok(())
            }
        }
    }
}

async fn find_todo(
    todos: &DocumentService<Todo>,
    id: &str,
    user_id: &str,
) -> Result<Document<Todo>, Box<dyn std::error::Error>> {
    match todos.get_by_id(id).await? {
        Some(todo) if todo.user_id == user_id => Ok(todo),
        _ => Err(format!("Todo not found: {}", id).into()),
    }
}

fn print_table(items: &[Document<Todo>]) {
    println!("{:<32}  {:<4}  {:<40}  CREATED", "ID", "DONE", "TITLE");
    println!("{}", "-".repeat(100));
    for todo in items {
        let done = if todo.completed { "x" } else { "" };
        println!(
            "{:<32}  {:<4}  {:<40}  {}",
            todo.id,
            done,
            truncate(&todo.title, 40),
            todo.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    let (completed, total) = Todo::stats(items);
    println!("\nTotal: {} todo(s), {} completed", total, completed);
}

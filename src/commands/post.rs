use clap::{Args, Subcommand};

use super::{truncate, OutputFormat};
use firestarter::Config;
use firestarter::db::{Constraint, Direction, CREATED_AT_FIELD};
use firestarter::{DocumentService, Patch, Post};

#[derive(Args)]
pub struct PostCommand {
    /// Author user id (defaults to the configured default_user)
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: PostSubcommand,
}

#[derive(Subcommand)]
pub enum PostSubcommand {
    /// Write a draft post
    Add {
        /// Post title
        title: String,

        /// Post body
        #[arg(long, default_value = "")]
        content: String,

        /// Author display name
        #[arg(long)]
        author_name: Option<String>,

        /// Tags (can be repeated)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,
    },

    /// List posts, newest first
    List {
        /// Include drafts from every author
        #[arg(long)]
        all: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Publish a draft
    Publish {
        /// Post id
        id: String,
    },
}

impl PostCommand {
    pub async fn run(
        &self,
        posts: &DocumentService<Post>,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let user_id = self.user.as_deref().unwrap_or(&config.default_user.value);

        match &self.command {
            PostSubcommand::Add {
                title,
                content,
                author_name,
                tags,
            } => {
                if title.trim().is_empty() {
                    return Err("Post title cannot be empty".into());
                }
                let author = author_name.as_deref().unwrap_or(user_id);
                let post = Post::new(title.trim(), content, user_id, author).with_tags(tags.clone());

                let id = posts.create(&post).await?;
                println!("Created draft {}  {}", id, post.title);
                Ok(())
            }

            PostSubcommand::List { all, format } => {
                let constraints = if *all {
                    vec![Constraint::order_by(CREATED_AT_FIELD, Direction::Desc)]
                } else {
                    Post::published_feed()
                };
                let items = posts.get_all(&constraints).await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&items)?);
                    }
                    OutputFormat::Text => {
                        if items.is_empty() {
                            println!("No posts found");
                            return Ok(());
                        }
                        println!("{:<32}  {:<30}  {:<20}  LIKES", "ID", "TITLE", "AUTHOR");
                        println!("{}", "-".repeat(95));
                        for post in &items {
                            let title = if post.published {
                                truncate(&post.title, 30)
                            } else {
                                truncate(&format!("(draft) {}", post.title), 30)
                            };
                            println!(
                                "{:<32}  {:<30}  {:<20}  {}",
                                post.id,
                                title,
                                truncate(&post.author_name, 20),
                                post.likes
                            );
                        }
                        println!("\nTotal: {} post(s)", items.len());
                    }
                }
                Ok(())
            }

            PostSubcommand::Publish { id } => {
                match posts.get_by_id(id).await? {
                    Some(post) if post.author_id == user_id => {
                        posts.update(id, Patch::new().set("published", true)).await?;
                        println!("Published: {}", post.title);
                        Ok(())
                    }
                    _ => Err(format!("Post not found: {}", id).into()),
                }
            }
        }
    }
}

use crate::chain::ChainSpec;
use crate::error::{ContractError, Severity};
use crate::feed::{FeedComposer, FeedEntry, FeedError};
use crate::node::{SyncialNode, WalletContext};
use crate::polling::{self, PollerHandle};
use crate::prices::{HermesClient, PriceFeed, PriceQuote};
use crate::services::market::format_amount;
use crate::services::{parse_address, ContractServices, PollView, PostView};
use crate::upload_client::UploadClient;
use crate::utils::short_address;
use crate::wallet::{WalletSession, WriteReceipt};
use alloy::primitives::utils::parse_units;
use alloy::primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use chrono::Utc;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_FEED_PAGE: u64 = 20;
const PRICE_DECIMALS: u8 = 8;

/// Run the interactive CLI against the configured wallet and contracts.
pub async fn run_cli(node: &SyncialNode) -> Result<()> {
    let wallet = match node.connect_wallet().await {
        Ok(wallet) => wallet,
        Err(err) => {
            tracing::warn!(error = %err, "wallet connection failed, continuing read-only");
            let session = Arc::new(WalletSession::disconnected());
            WalletContext {
                services: ContractServices::new(session.clone(), &node.config().contracts),
                session,
            }
        }
    };
    let uploads = node.upload_client();
    let feed = wallet.feed(uploads.clone()).ok().map(Arc::new);
    let prices = node.prices();

    let mut session = CliSession {
        chain: node.config().chain.clone(),
        price_poller: polling::poll_prices(prices.clone()),
        market_poller: polling::poll_markets(wallet.services.market.clone()),
        feed_poller: feed.clone().map(polling::poll_feed),
        wallet,
        uploads,
        feed,
        prices,
    };

    println!("Syncial CLI ready. Type 'help' for a list of commands.");
    session.print_identity().await;

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        print!("syncial> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            println!("Exiting");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let tokens = match shell_words::split(trimmed) {
            Ok(tokens) if !tokens.is_empty() => tokens,
            Ok(_) => continue,
            Err(err) => {
                println!("Unable to parse command: {err}");
                continue;
            }
        };

        match session.handle_command(&tokens).await {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Exit) => break,
            Err(err) => report(&err),
        }
    }

    session.shutdown().await;
    Ok(())
}

fn report(err: &anyhow::Error) {
    if let Some(contract) = err.downcast_ref::<ContractError>() {
        match contract.severity() {
            Severity::Warning => println!("Warning: {}", contract.user_message()),
            Severity::Error => println!("Error: {}", contract.user_message()),
        }
    } else if let Some(feed) = err.downcast_ref::<FeedError>() {
        println!("Error: {}", feed.user_message());
    } else {
        println!("Error: {err:#}");
    }
}

struct CliSession {
    chain: ChainSpec,
    wallet: WalletContext,
    uploads: UploadClient,
    feed: Option<Arc<FeedComposer>>,
    prices: HermesClient,
    price_poller: PollerHandle<Vec<PriceQuote>>,
    market_poller: PollerHandle<Vec<PollView>>,
    feed_poller: Option<PollerHandle<Vec<FeedEntry>>>,
}

enum LoopAction {
    Continue,
    Exit,
}

impl CliSession {
    async fn handle_command(&mut self, tokens: &[String]) -> Result<LoopAction> {
        let command = tokens[0].as_str();
        let args = &tokens[1..];
        match command {
            "help" => self.print_help(),
            "whoami" => self.print_identity().await,
            "post" => {
                let Some(path) = args.first() else {
                    println!("Usage: post <image file>");
                    return Ok(LoopAction::Continue);
                };
                self.post_image(Path::new(path)).await?;
            }
            "posts" => {
                let target = match args.first() {
                    Some(raw) => self.resolve_target(raw).await?,
                    None => self.wallet.session.require_account()?,
                };
                let posts = self.wallet.services.posts.get_user_posts(target).await?;
                self.print_posts(&posts).await;
            }
            "mine" => {
                let Some(feed) = &self.feed else {
                    bail!(ContractError::NotConnected);
                };
                let entries = feed.refresh().await?;
                if entries.is_empty() {
                    println!("Nothing posted yet.");
                }
                for entry in entries {
                    let visibility = if entry.is_private { " (private)" } else { "" };
                    println!("  [{}] {}{}", entry.id, entry.image, visibility);
                }
            }
            "feed" => {
                let offset = parse_or(args.first(), 0)?;
                let count = parse_or(args.get(1), DEFAULT_FEED_PAGE)?;
                let posts = self.wallet.services.posts.get_feed(offset, count).await?;
                self.print_posts(&posts).await;
            }
            "all" => {
                let posts = self.wallet.services.posts.get_all_posts().await?;
                self.print_posts(&posts).await;
            }
            "post-info" => {
                let Some(id) = args.first() else {
                    println!("Usage: post-info <post id>");
                    return Ok(LoopAction::Continue);
                };
                let post = self.wallet.services.posts.get_post(parse_id(id)?).await?;
                if post.is_deleted {
                    println!("Post #{} was deleted.", post.id);
                } else {
                    self.print_posts(std::slice::from_ref(&post)).await;
                }
            }
            "privacy" => {
                let (Some(id), Some(visibility)) = (args.first(), args.get(1)) else {
                    println!("Usage: privacy <post id> <public|private>");
                    return Ok(LoopAction::Continue);
                };
                let receipt = self
                    .wallet
                    .services
                    .posts
                    .set_post_privacy(parse_id(id)?, parse_visibility(visibility)?)
                    .await?;
                self.print_receipt(&receipt)?;
            }
            "delete" => {
                let Some(id) = args.first() else {
                    println!("Usage: delete <post id>");
                    return Ok(LoopAction::Continue);
                };
                let receipt = self.wallet.services.posts.delete_post(parse_id(id)?).await?;
                self.print_receipt(&receipt)?;
            }
            "follow" | "unfollow" => {
                let Some(target) = args.first() else {
                    println!("Usage: {command} <address|@username>");
                    return Ok(LoopAction::Continue);
                };
                let receipt = self.change_follow(target, command == "follow").await?;
                self.print_receipt(&receipt)?;
            }
            "followers" | "following" => {
                let user = match args.first() {
                    Some(raw) => self.resolve_target(raw).await?,
                    None => self.wallet.session.require_account()?,
                };
                let social = &self.wallet.services.social;
                let list = if command == "followers" {
                    social.get_followers(user).await?
                } else {
                    social.get_following(user).await?
                };
                if list.is_empty() {
                    println!("(none)");
                }
                for address in list {
                    println!("  {}", self.display_name(address).await);
                }
            }
            "username" => {
                let user = match args.first() {
                    Some(raw) => parse_address(raw)?,
                    None => self.wallet.session.require_account()?,
                };
                match self.wallet.services.usernames.username_of(user).await? {
                    Some(name) => println!("@{name}"),
                    None => println!("{} has no username", short_address(&user)),
                }
            }
            "mint" => {
                let Some(name) = args.first() else {
                    println!("Usage: mint <username>");
                    return Ok(LoopAction::Continue);
                };
                let receipt = self.wallet.services.usernames.mint_username(name).await?;
                self.print_receipt(&receipt)?;
            }
            "polls" => {
                let polls = match self.market_poller.latest() {
                    Some(polls) => polls,
                    None => self.wallet.services.market.list_polls().await?,
                };
                if polls.is_empty() {
                    println!("No polls yet.");
                }
                for poll in polls {
                    println!(
                        "  [{}] {} ({:?}, pool {})",
                        poll.id,
                        poll.question,
                        poll.phase(Utc::now()),
                        format_amount(poll.total_pool())
                    );
                }
            }
            "poll" => {
                let Some(id) = args.first() else {
                    println!("Usage: poll <id>");
                    return Ok(LoopAction::Continue);
                };
                let poll = self.wallet.services.market.poll(parse_id(id)?).await?;
                self.print_poll(&poll).await?;
            }
            "bet" => {
                let (Some(id), Some(side), Some(amount)) = (args.first(), args.get(1), args.get(2))
                else {
                    println!("Usage: bet <poll id> <yes|no> <amount>");
                    return Ok(LoopAction::Continue);
                };
                let receipt = self
                    .wallet
                    .services
                    .market
                    .place_bet(parse_id(id)?, parse_side(side)?, amount)
                    .await?;
                self.market_poller.refresh_now();
                self.print_receipt(&receipt)?;
            }
            "resolve" => {
                let Some(id) = args.first() else {
                    println!("Usage: resolve <poll id>");
                    return Ok(LoopAction::Continue);
                };
                let receipt = self.wallet.services.market.resolve_poll(parse_id(id)?).await?;
                self.market_poller.refresh_now();
                self.print_receipt(&receipt)?;
            }
            "create-poll" => {
                let [question, minutes, asset, quote, target] = args else {
                    println!("Usage: create-poll \"<question>\" <minutes> <asset> <quote> <target price>");
                    return Ok(LoopAction::Continue);
                };
                let minutes = parse_id(minutes)?;
                let asset = parse_feed(asset)?;
                let quote = parse_feed(quote)?;
                let target = parse_units(target, PRICE_DECIMALS)
                    .with_context(|| format!("{target:?} is not a valid price"))?
                    .get_absolute();
                let receipt = self
                    .wallet
                    .services
                    .market
                    .create_poll(
                        question,
                        Duration::from_secs(minutes.saturating_mul(60)),
                        asset.id(),
                        quote.id(),
                        target,
                    )
                    .await?;
                self.market_poller.refresh_now();
                self.print_receipt(&receipt)?;
            }
            "update-max" => {
                let Some(id) = args.first() else {
                    println!("Usage: update-max <poll id>");
                    return Ok(LoopAction::Continue);
                };
                let receipt = self
                    .wallet
                    .services
                    .market
                    .update_max_price(parse_id(id)?)
                    .await?;
                self.market_poller.refresh_now();
                self.print_receipt(&receipt)?;
            }
            "prices" => {
                let quotes = match self.price_poller.latest() {
                    Some(quotes) => quotes,
                    None => self.prices.latest_defaults().await?,
                };
                for quote in quotes {
                    println!("  {quote}");
                }
            }
            "storage" => {
                let status = self.uploads.storage_status().await?;
                println!("{}: {}", status.status, status.message);
            }
            "quit" | "exit" => return Ok(LoopAction::Exit),
            "clear" => print!("\x1B[2J\x1B[1;1H"),
            other => {
                println!("Unknown command '{other}'. Type 'help' for a list of commands.");
            }
        }
        Ok(LoopAction::Continue)
    }

    fn print_help(&self) {
        println!("Available commands:");
        println!("  help                       Show this help message");
        println!("  whoami                     Show the connected account and signers");
        println!("  post <file>                Upload an image and post it");
        println!("  posts [address|@name]      List a user's posts (yours by default)");
        println!("  mine                       Your posts, including ones still confirming");
        println!("  feed [offset] [count]      Page through the global feed");
        println!("  all                        List every post on chain");
        println!("  post-info <id>             Show a single post");
        println!("  privacy <id> <public|private>  Change a post's visibility");
        println!("  delete <id>                Delete one of your posts");
        println!("  follow <address|@name>     Follow a user");
        println!("  unfollow <address|@name>   Unfollow a user");
        println!("  followers [address|@name]  List followers");
        println!("  following [address|@name]  List followed users");
        println!("  username [address]         Look up a username");
        println!("  mint <name>                Claim a username");
        println!("  polls                      List prediction polls");
        println!("  poll <id>                  Show one poll");
        println!("  bet <id> <yes|no> <amount> Bet on a poll");
        println!("  resolve <id>               Resolve an ended poll");
        println!("  create-poll \"<q>\" <minutes> <asset> <quote> <target>");
        println!("                             Open a poll on ETH/HBAR/BTC/SOL prices");
        println!("  update-max <id>            Record the current price against a poll");
        println!("  prices                     Latest ETH/HBAR/BTC/SOL prices");
        println!("  storage                    Upload service status");
        println!("  clear                      Clear the screen");
        println!("  quit                       Leave the CLI");
    }

    async fn print_identity(&self) {
        println!("Chain: {}", self.chain);
        match self.wallet.session.account() {
            Some(account) => {
                println!("Account: {account}");
                if let Ok(Some(name)) = self.wallet.services.usernames.username_of(account).await {
                    println!("Username: @{name}");
                }
            }
            None => println!("Account: (read-only, no wallet connected)"),
        }
        let signers = self.wallet.session.signer_chain();
        if !signers.is_empty() {
            println!("Signers: {signers:?}");
        }
    }

    async fn post_image(&self, path: &Path) -> Result<()> {
        let Some(feed) = &self.feed else {
            bail!(ContractError::NotConnected);
        };
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".into());
        let entry = feed.publish_image(Bytes::from(bytes), &file_name, None).await?;
        if let Some(poller) = &self.feed_poller {
            poller.refresh_now();
        }
        println!("Posted {} as {}", entry.image, entry.id);
        if let Some(url) = entry
            .tx_hash
            .and_then(|hash| self.chain.tx_url(&hash.to_string()))
        {
            println!("  {url}");
        }
        Ok(())
    }

    async fn change_follow(&self, target: &str, follow: bool) -> Result<WriteReceipt> {
        let social = &self.wallet.services.social;
        let receipt = if target.starts_with("0x") {
            let address = parse_address(target)?;
            if follow {
                social.follow(address).await?
            } else {
                social.unfollow(address).await?
            }
        } else if follow {
            social.follow_by_username(target).await?
        } else {
            social.unfollow_by_username(target).await?
        };
        Ok(receipt)
    }

    async fn resolve_target(&self, raw: &str) -> Result<Address> {
        if raw.starts_with("0x") {
            return Ok(parse_address(raw)?);
        }
        let name = raw.trim_start_matches('@');
        self.wallet
            .services
            .usernames
            .resolve_username(name)
            .await?
            .ok_or_else(|| anyhow!("no account holds the username @{name}"))
    }

    async fn display_name(&self, address: Address) -> String {
        match self.wallet.services.usernames.username_of(address).await {
            Ok(Some(name)) => format!("@{name} ({})", short_address(&address)),
            _ => address.to_string(),
        }
    }

    async fn print_posts(&self, posts: &[PostView]) {
        let visible: Vec<&PostView> = posts.iter().filter(|post| !post.is_deleted).collect();
        if visible.is_empty() {
            println!("No posts.");
            return;
        }
        for post in visible {
            let visibility = if post.is_private { " (private)" } else { "" };
            println!(
                "  #{} by {} at {}{}",
                post.id,
                self.display_name(post.author).await,
                post.timestamp.format("%Y-%m-%d %H:%M"),
                visibility
            );
            println!("      image: {}", post.image);
        }
    }

    async fn print_poll(&self, poll: &PollView) -> Result<()> {
        println!("Poll #{}: {}", poll.id, poll.question);
        println!("  Phase: {:?}", poll.phase(Utc::now()));
        println!("  Ends: {}", poll.end_time.format("%Y-%m-%d %H:%M UTC"));
        println!("  Target price: {}", format_amount(poll.target_price));
        println!("  Max price so far: {}", format_amount(poll.max_price_during_poll));
        println!(
            "  Pool: {} yes / {} no",
            format_amount(poll.total_yes),
            format_amount(poll.total_no)
        );
        println!("  Host: {}", self.display_name(poll.host).await);
        if let Some(account) = self.wallet.session.account() {
            let bets = self.wallet.services.market.user_bets(poll.id, account).await?;
            println!(
                "  Your bets: {} yes / {} no",
                format_amount(bets.yes),
                format_amount(bets.no)
            );
        }
        Ok(())
    }

    async fn shutdown(self) {
        self.price_poller.shutdown().await;
        self.market_poller.shutdown().await;
        if let Some(poller) = self.feed_poller {
            poller.shutdown().await;
        }
    }

    fn print_receipt(&self, receipt: &WriteReceipt) -> Result<()> {
        if !receipt.success {
            bail!("Blockchain transaction failed ({})", receipt.tx_hash);
        }
        println!("Confirmed {} via {:?}", receipt.tx_hash, receipt.via);
        if let Some(url) = self.chain.tx_url(&receipt.tx_hash.to_string()) {
            println!("  {url}");
        }
        Ok(())
    }
}

fn parse_id(raw: &str) -> Result<u64> {
    raw.trim_start_matches('#')
        .parse()
        .with_context(|| format!("{raw:?} is not a valid id"))
}

fn parse_or(raw: Option<&String>, default: u64) -> Result<u64> {
    raw.map(|value| parse_id(value)).transpose().map(|v| v.unwrap_or(default))
}

fn parse_visibility(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "private" => Ok(true),
        "public" => Ok(false),
        other => bail!("expected public or private, got {other:?}"),
    }
}

fn parse_feed(raw: &str) -> Result<PriceFeed> {
    PriceFeed::from_symbol(raw)
        .ok_or_else(|| anyhow!("unknown price feed {raw:?}, expected ETH, HBAR, BTC or SOL"))
}

fn parse_side(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "y" => Ok(true),
        "no" | "n" => Ok(false),
        other => bail!("expected yes or no, got {other:?}"),
    }
}

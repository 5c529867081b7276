//! Operator commands: OPER, KILL, REHASH, RESTART, DIE.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use ember_proto::{wildcard_match, Message, Prefix, Response};
use tracing::{error, info, warn};

use super::{actor, actor_nick, actor_prefix, sourced};
use crate::config::{validate, Config};
use crate::dispatch::{Access, CommandSpec, HandlerResult, Registry};
use crate::server::{Server, ShutdownKind};
use crate::store::Uid;

/// Register OPER/KILL/REHASH/RESTART/DIE.
pub fn register(registry: &mut Registry) {
    registry.register(CommandSpec {
        name: "OPER",
        min_params: 2,
        max_params: 2,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_oper,
    });
    registry.register(CommandSpec {
        name: "KILL",
        min_params: 2,
        max_params: 2,
        access: Access::Operator,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_kill,
    });
    registry.register(CommandSpec {
        name: "REHASH",
        min_params: 0,
        max_params: 0,
        access: Access::Operator,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_rehash,
    });
    registry.register(CommandSpec {
        name: "RESTART",
        min_params: 0,
        max_params: 0,
        access: Access::Operator,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_restart,
    });
    registry.register(CommandSpec {
        name: "DIE",
        min_params: 0,
        max_params: 0,
        access: Access::Operator,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_die,
    });
}

fn handle_oper(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let account = params[0].clone();
    let password = params[1].clone();
    let config = server.config();

    let (real_host, displayed_host, ip) = {
        let user = actor(server, uid)?;
        (
            user.real_host.clone(),
            user.displayed_host.clone(),
            user.addr.ip().to_string(),
        )
    };

    let block = config.operators.iter().find(|op| {
        op.name == account
            && [&real_host, &displayed_host, &ip]
                .iter()
                .any(|host| wildcard_match(&op.host_mask, host))
    });
    let Some(block) = block else {
        warn!(nick = %nick, account = %account, host = %real_host, "OPER from unmatched host");
        return Ok(vec![Message::reply(
            Response::ERR_NOOPERHOST,
            nick,
            vec!["No O-lines for your host".to_string()],
        )]);
    };

    let verified = PasswordHash::new(&block.password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false);
    if !verified {
        warn!(nick = %nick, account = %account, "OPER with bad credentials");
        return Ok(vec![Message::reply(
            Response::ERR_PASSWDMISMATCH,
            nick,
            vec!["Password incorrect".to_string()],
        )]);
    }

    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        user.oper_name = Some(block.name.clone());
        user.modes.insert('o');
    }
    info!(nick = %nick, account = %account, oper_type = %block.oper_type, "operator authenticated");

    let prefix = actor_prefix(server, uid)?;
    Ok(vec![
        Message::reply(
            Response::RPL_YOUREOPER,
            nick.clone(),
            vec!["You are now an IRC operator".to_string()],
        ),
        sourced(prefix, "MODE", vec![nick, "+o".to_string()]),
    ])
}

fn handle_kill(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let target_nick = params[0].clone();
    let reason = params[1].clone();

    let Some(target) = server.store.find_user_by_nick(&target_nick) else {
        return Ok(vec![Message::reply(
            Response::ERR_NOSUCHNICK,
            nick,
            vec![target_nick, "No such nick".to_string()],
        )]);
    };
    let target_uid = target.uid.clone();
    let target_name = target.nick.clone();

    let prefix = actor_prefix(server, uid)?;
    let kill_msg = sourced(
        prefix,
        "KILL",
        vec![target_name.clone(), reason.clone()],
    );
    super::send_to(server, &target_uid, &kill_msg);

    let quit_reason = format!("Killed ({nick} ({reason}))");
    super::connection::quit_user(server, &target_uid, &quit_reason);
    info!(target = %target_name, by = %nick, reason = %reason, "session killed");
    Ok(Vec::new())
}

fn handle_rehash(server: &mut Server, uid: &Uid, _params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let Some(path) = server.config_path.clone() else {
        return Ok(vec![oper_notice(
            server,
            &nick,
            "REHASH failed: no config path recorded for this process",
        )]);
    };

    // A broken file keeps the old snapshot running; every problem found
    // is surfaced to the requesting oper.
    let loaded = match Config::load(&path) {
        Ok(c) => c,
        Err(e) => {
            error!(path = %path, error = %e, "REHASH: config reload failed");
            return Ok(vec![oper_notice(
                server,
                &nick,
                &format!("REHASH failed, keeping current config: {e}"),
            )]);
        }
    };
    if let Err(errors) = validate(&loaded) {
        error!(path = %path, count = errors.len(), "REHASH: config validation failed");
        let mut out: Vec<Message> = errors
            .iter()
            .map(|e| oper_notice(server, &nick, &format!("REHASH: {e}")))
            .collect();
        out.push(oper_notice(
            server,
            &nick,
            "REHASH failed, keeping current config",
        ));
        return Ok(out);
    }

    server.rehash(loaded);
    info!(path = %path, by = %nick, "configuration rehashed");
    Ok(vec![Message::reply(
        Response::RPL_REHASHING,
        nick,
        vec![path, "Rehashing".to_string()],
    )])
}

fn handle_restart(server: &mut Server, uid: &Uid, _params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    info!(by = %nick, "RESTART requested");
    server.shutdown = Some(ShutdownKind::Restart);
    Ok(vec![oper_notice(server, &nick, "Server restarting")])
}

fn handle_die(server: &mut Server, uid: &Uid, _params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    info!(by = %nick, "DIE requested");
    server.shutdown = Some(ShutdownKind::Die);
    Ok(vec![oper_notice(server, &nick, "Server shutting down")])
}

/// A server-sourced NOTICE to the acting oper.
fn oper_notice(server: &Server, nick: &str, text: &str) -> Message {
    Message::notice(nick, text)
        .with_prefix(Prefix::ServerName(server.config().server.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_registry;
    use crate::dispatch::process_line;
    use crate::user::User;

    /// A fixed argon2id hash of the password "letmein", so tests don't
    /// need to generate hashes at run time.
    const LETMEIN_HASH: &str =
        "$argon2id$v=19$m=19456,t=2,p=1$b3BlcmF0b3JzYWx0$7yGXNTo7Uo+DJz/TwwyeEWbHIOQRzYtAHQq7GCRTPEY";

    fn test_server_with_oper() -> Server {
        let config: crate::config::Config = toml::from_str(&format!(
            r#"
            [server]
            name = "irc.example.test"
            network = "ExampleNet"
            sid = "1AB"
            description = "test"
            listen = "127.0.0.1:6667"

            [[operators]]
            name = "admin"
            password_hash = "{LETMEIN_HASH}"
            host_mask = "*"
            "#
        ))
        .unwrap();
        Server::new(config)
    }

    fn registered(server: &mut Server, nick: &str) -> Uid {
        let uid = server.uid_gen.next();
        let mut user = User::new(uid.clone(), "127.0.0.1:1".parse().unwrap(), "host".into())
            .with_nick(nick.into());
        user.ident = nick.chars().next().unwrap().to_string();
        user.registration.user_received = true;
        user.registration.fully_connected = true;
        server.store.insert_user(user).unwrap();
        uid
    }

    #[test]
    fn oper_with_unknown_account_gets_491() {
        let mut server = test_server_with_oper();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        let out = process_line(&mut server, &registry, &alice, "OPER nosuch pw\r\n");
        assert_eq!(out[0].command, "491");
    }

    #[test]
    fn oper_with_wrong_password_gets_464() {
        let mut server = test_server_with_oper();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        let out = process_line(&mut server, &registry, &alice, "OPER admin wrong\r\n");
        assert_eq!(out[0].command, "464");
        assert!(!server.store.find_user_by_uid(&alice).unwrap().is_oper());
    }

    #[test]
    fn host_mask_mismatch_gets_491_not_464() {
        let mut server = test_server_with_oper();
        {
            let mut config = (*server.config()).clone();
            config.operators[0].host_mask = "*.trusted.example".to_string();
            server.rehash(config);
        }
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        let out = process_line(&mut server, &registry, &alice, "OPER admin letmein\r\n");
        assert_eq!(out[0].command, "491");
    }

    #[test]
    fn kill_requires_oper_privilege() {
        let mut server = test_server_with_oper();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        registered(&mut server, "bob");
        let out = process_line(&mut server, &registry, &alice, "KILL bob :bye\r\n");
        assert_eq!(out[0].command, "481");
        assert!(server.store.find_user_by_nick("bob").is_some());
    }

    #[test]
    fn kill_by_oper_removes_target() {
        let mut server = test_server_with_oper();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        registered(&mut server, "bob");
        server.store.find_user_by_uid_mut(&alice).unwrap().oper_name = Some("admin".into());
        let out = process_line(&mut server, &registry, &alice, "KILL bob :flooding\r\n");
        assert!(out.is_empty());
        assert!(server.store.find_user_by_nick("bob").is_none());
    }

    #[test]
    fn die_sets_shutdown_flag() {
        let mut server = test_server_with_oper();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        server.store.find_user_by_uid_mut(&alice).unwrap().oper_name = Some("admin".into());
        process_line(&mut server, &registry, &alice, "DIE\r\n");
        assert_eq!(server.shutdown, Some(ShutdownKind::Die));
    }

    #[test]
    fn rehash_without_config_path_reports_failure() {
        let mut server = test_server_with_oper();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        server.store.find_user_by_uid_mut(&alice).unwrap().oper_name = Some("admin".into());
        let out = process_line(&mut server, &registry, &alice, "REHASH\r\n");
        assert_eq!(out[0].command, "NOTICE");
    }

    #[test]
    fn rehash_keeps_old_config_when_new_one_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [server]
            name = "irc.example.test"
            network = "ExampleNet"
            sid = "toolong"
            description = "test"
            listen = "127.0.0.1:6667"
            "#,
        )
        .unwrap();

        let mut server = test_server_with_oper();
        server.config_path = Some(path.to_string_lossy().into_owned());
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        server.store.find_user_by_uid_mut(&alice).unwrap().oper_name = Some("admin".into());
        let out = process_line(&mut server, &registry, &alice, "REHASH\r\n");
        assert!(out.iter().all(|m| m.command == "NOTICE"));
        assert_eq!(server.config().server.sid, "1AB");
    }
}

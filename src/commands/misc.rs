//! Session-utility commands: AWAY, ISON, USERHOST, MOTD, RULES.

use ember_proto::{Message, Response};

use super::actor_nick;
use crate::dispatch::{Access, CommandSpec, HandlerResult, Registry};
use crate::reply::NumericListBuilder;
use crate::server::Server;
use crate::store::Uid;

/// Register AWAY/ISON/USERHOST/MOTD/RULES.
pub fn register(registry: &mut Registry) {
    registry.register(CommandSpec {
        name: "AWAY",
        min_params: 0,
        max_params: 1,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_away,
    });
    registry.register(CommandSpec {
        name: "ISON",
        min_params: 1,
        max_params: 0,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_ison,
    });
    registry.register(CommandSpec {
        name: "USERHOST",
        min_params: 1,
        max_params: 0,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_userhost,
    });
    registry.register(CommandSpec {
        name: "MOTD",
        min_params: 0,
        max_params: 0,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_motd,
    });
    registry.register(CommandSpec {
        name: "RULES",
        min_params: 0,
        max_params: 0,
        access: Access::Normal,
        works_before_registration: false,
        penalty_ms: 1000,
        allow_empty_last_param: false,
        loop_call_index: None,
        loop_call_paired_index: None,
        handler: handle_rules,
    });
}

fn handle_away(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let message = params.first().filter(|m| !m.is_empty()).cloned();
    let marking_away = message.is_some();
    if let Some(user) = server.store.find_user_by_uid_mut(uid) {
        user.away = message;
    }
    if marking_away {
        Ok(vec![Message::reply(
            Response::RPL_NOWAWAY,
            nick,
            vec!["You have been marked as being away".to_string()],
        )])
    } else {
        Ok(vec![Message::reply(
            Response::RPL_UNAWAY,
            nick,
            vec!["You are no longer marked as being away".to_string()],
        )])
    }
}

fn handle_ison(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let max_line = server.config().limits.max_line_length;
    let mut builder =
        NumericListBuilder::new(Response::RPL_ISON, nick, Vec::new(), " ", max_line);
    let mut any = false;
    for queried in params.iter().flat_map(|p| p.split(' ')) {
        if queried.is_empty() {
            continue;
        }
        if let Some(user) = server.store.find_user_by_nick(queried) {
            builder.push(user.nick.clone());
            any = true;
        }
    }
    if !any {
        // An all-offline query still gets one (empty) 303 line.
        return Ok(vec![Message::reply(
            Response::RPL_ISON,
            actor_nick(server, uid),
            vec![String::new()],
        )]);
    }
    Ok(builder.build())
}

fn handle_userhost(server: &mut Server, uid: &Uid, params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let mut entries = Vec::new();
    for queried in params.iter().flat_map(|p| p.split(' ')).take(5) {
        let Some(user) = server.store.find_user_by_nick(queried) else {
            continue;
        };
        let oper_flag = if user.is_oper() { "*" } else { "" };
        let away_flag = if user.away.is_some() { "-" } else { "+" };
        entries.push(format!(
            "{}{oper_flag}={away_flag}{}@{}",
            user.nick, user.ident, user.displayed_host
        ));
    }
    Ok(vec![Message::reply(
        Response::RPL_USERHOST,
        nick,
        vec![entries.join(" ")],
    )])
}

fn handle_motd(server: &mut Server, uid: &Uid, _params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    Ok(motd_numerics(server, &nick))
}

/// 375/372/376, or 422 when no MOTD file is configured/readable. Shared
/// with the registration burst.
pub(crate) fn motd_numerics(server: &Server, nick: &str) -> Vec<Message> {
    let server_name = server.config().server.name.clone();
    let Some(lines) = &server.motd else {
        return vec![Message::reply(
            Response::ERR_NOMOTD,
            nick,
            vec!["MOTD File is missing".to_string()],
        )];
    };
    let mut out = vec![Message::reply(
        Response::RPL_MOTDSTART,
        nick,
        vec![format!("- {server_name} Message of the day - ")],
    )];
    for line in lines {
        out.push(Message::reply(
            Response::RPL_MOTD,
            nick,
            vec![format!("- {line}")],
        ));
    }
    out.push(Message::reply(
        Response::RPL_ENDOFMOTD,
        nick,
        vec!["End of /MOTD command.".to_string()],
    ));
    out
}

fn handle_rules(server: &mut Server, uid: &Uid, _params: &[String]) -> HandlerResult {
    let nick = actor_nick(server, uid);
    let server_name = server.config().server.name.clone();
    let Some(lines) = &server.rules else {
        return Ok(vec![Message::reply(
            Response::ERR_NOMOTD,
            nick,
            vec!["RULES File is missing".to_string()],
        )]);
    };
    let mut out = vec![Message::reply(
        Response::RPL_RULESSTART,
        nick.clone(),
        vec![format!("- {server_name} server rules -")],
    )];
    for line in lines {
        out.push(Message::reply(
            Response::RPL_RULES,
            nick.clone(),
            vec![format!("- {line}")],
        ));
    }
    out.push(Message::reply(
        Response::RPL_RULESEND,
        nick,
        vec!["End of RULES command.".to_string()],
    ));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_registry;
    use crate::dispatch::process_line;
    use crate::user::User;

    fn test_server() -> Server {
        let config: crate::config::Config = toml::from_str(
            r#"
            [server]
            name = "irc.example.test"
            network = "ExampleNet"
            sid = "1AB"
            description = "test"
            listen = "127.0.0.1:6667"
            "#,
        )
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
    fn away_sets_and_clears() {
        let mut server = test_server();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        let out = process_line(&mut server, &registry, &alice, "AWAY :lunch\r\n");
        assert_eq!(out[0].command, "306");
        assert_eq!(
            server.store.find_user_by_uid(&alice).unwrap().away.as_deref(),
            Some("lunch")
        );
        let out = process_line(&mut server, &registry, &alice, "AWAY\r\n");
        assert_eq!(out[0].command, "305");
        assert!(server.store.find_user_by_uid(&alice).unwrap().away.is_none());
    }

    #[test]
    fn ison_reports_only_online_nicks() {
        let mut server = test_server();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        registered(&mut server, "bob");
        let out = process_line(&mut server, &registry, &alice, "ISON bob ghost alice\r\n");
        assert_eq!(out[0].command, "303");
        let listed = out[0].params.last().unwrap();
        assert!(listed.contains("bob"));
        assert!(listed.contains("alice"));
        assert!(!listed.contains("ghost"));
    }

    #[test]
    fn ison_with_no_hits_sends_empty_reply() {
        let mut server = test_server();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        let out = process_line(&mut server, &registry, &alice, "ISON ghost\r\n");
        assert_eq!(out[0].command, "303");
        assert_eq!(out[0].params.last().unwrap(), "");
    }

    #[test]
    fn userhost_marks_away_and_oper() {
        let mut server = test_server();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        let bob = registered(&mut server, "bob");
        process_line(&mut server, &registry, &bob, "AWAY :out\r\n");
        server.store.find_user_by_uid_mut(&bob).unwrap().oper_name = Some("admin".into());
        let out = process_line(&mut server, &registry, &alice, "USERHOST bob\r\n");
        assert_eq!(out[0].command, "302");
        assert_eq!(out[0].params.last().unwrap(), "bob*=-b@host");
    }

    #[test]
    fn motd_without_file_is_422() {
        let mut server = test_server();
        let registry = build_registry();
        let alice = registered(&mut server, "alice");
        let out = process_line(&mut server, &registry, &alice, "MOTD\r\n");
        assert_eq!(out[0].command, "422");
    }

    #[test]
    fn motd_with_lines_brackets_372_between_375_376() {
        let mut server = test_server();
        let registry = build_registry();
        server.motd = Some(vec!["line one".to_string(), "line two".to_string()]);
        let alice = registered(&mut server, "alice");
        let out = process_line(&mut server, &registry, &alice, "MOTD\r\n");
        assert_eq!(out[0].command, "375");
        assert_eq!(out[1].command, "372");
        assert_eq!(out[2].command, "372");
        assert_eq!(out[3].command, "376");
    }
}

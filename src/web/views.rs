//! Plain HTML pages. Every interpolated value goes through `escape`.

use std::fmt::Write;

use crate::db::cars::{Car, NewCar};
use crate::db::logs::AccessLogEntry;
use crate::staging::PendingSubmission;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn layout(title: &str, logged_in: bool, flashes: &[String], body: &str) -> String {
    let nav = if logged_in {
        r#"<a href="/">Home</a> | <a href="/camera">Camera</a> | <a href="/upload">Check image</a> | <a href="/whitelist">Whitelist</a> | <a href="/add_car">Add car</a> | <a href="/upload_json">Requests</a> | <a href="/logs">Access log</a> | <a href="/logout">Log out</a>"#
    } else {
        r#"<a href="/">Home</a> | <a href="/login">Log in</a> | <a href="/register">Register</a>"#
    };

    let mut messages = String::new();
    for flash in flashes {
        let _ = write!(messages, r#"<li class="flash">{}</li>"#, escape(flash));
    }

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><nav>{nav}</nav><ul>{messages}</ul><h1>{title}</h1>{body}</body></html>",
        title = escape(title),
    )
}

pub fn index() -> String {
    "<p>Vehicle access control. Live recognition runs on the camera page; \
     residents register through the Telegram bot.</p>"
        .to_string()
}

pub fn credentials_form(action: &str, button: &str) -> String {
    format!(
        r#"<form method="post" action="{action}">
<label>Username <input name="username" required></label>
<label>Password <input name="password" type="password" required></label>
<button type="submit">{button}</button>
</form>"#,
        action = escape(action),
        button = escape(button),
    )
}

pub fn upload() -> String {
    r#"<input type="file" id="file" accept="image/*">
<button onclick="check()">Check</button>
<pre id="result"></pre>
<script>
async function check() {
  const file = document.getElementById('file').files[0];
  const out = document.getElementById('result');
  if (!file) { out.textContent = 'No file selected'; return; }
  const response = await fetch('/upload', {method: 'POST', body: file});
  const outcome = await response.json();
  let text = outcome.message;
  if (outcome.car) {
    text += `\n${outcome.car.plates}: ${outcome.car.fio}, room ${outcome.car.room}, phone ${outcome.car.phone}`;
  }
  out.textContent = text;
}
</script>"#
        .to_string()
}

pub fn camera() -> String {
    r#"<img src="/video_feed" alt="camera feed" width="640">
<p>Plate: <b id="plate">-</b> Status: <b id="status">-</b></p>
<script>
async function poll() {
  try {
    const snapshot = await (await fetch('/get_plate')).json();
    document.getElementById('plate').textContent = snapshot.plate || '-';
    document.getElementById('status').textContent = snapshot.status;
  } catch (e) {}
}
setInterval(poll, 2000);
poll();
</script>"#
        .to_string()
}

pub fn car_form(action: &str, button: &str, car: &NewCar) -> String {
    format!(
        r#"<form method="post" action="{action}">
<label>Plate <input name="plates" value="{plates}" required></label>
<label>Full name <input name="fio" value="{fio}" required></label>
<label>Room <input name="room" value="{room}" required></label>
<label>Phone <input name="phone" value="{phone}" required></label>
<button type="submit">{button}</button>
</form>"#,
        action = escape(action),
        button = escape(button),
        plates = escape(&car.plates),
        fio = escape(&car.fio),
        room = escape(&car.room),
        phone = escape(&car.phone),
    )
}

pub fn whitelist(cars: &[Car]) -> String {
    if cars.is_empty() {
        return "<p>The whitelist is empty.</p>".to_string();
    }

    let mut rows = String::new();
    for car in cars {
        let _ = write!(
            rows,
            r#"<tr><td>{plates}</td><td>{fio}</td><td>{room}</td><td>{phone}</td>
<td><a href="/edit_car/{id}">Edit</a>
<form method="post" action="/delete_car/{id}" style="display:inline"><button type="submit">Delete</button></form></td></tr>"#,
            id = car.id,
            plates = escape(&car.plates),
            fio = escape(&car.fio),
            room = escape(&car.room),
            phone = escape(&car.phone),
        );
    }

    format!(
        "<table><tr><th>Plate</th><th>Full name</th><th>Room</th><th>Phone</th><th></th></tr>{}</table>",
        rows
    )
}

pub fn access_log(entries: &[AccessLogEntry]) -> String {
    if entries.is_empty() {
        return "<p>No vehicles have passed yet.</p>".to_string();
    }

    let mut rows = String::new();
    for entry in entries {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape(&entry.plates),
            entry.date.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }
    format!("<table><tr><th>Plate</th><th>Time</th></tr>{}</table>", rows)
}

pub fn import(entries: &[PendingSubmission]) -> String {
    if entries.is_empty() {
        return "<p>No new registration requests.</p>".to_string();
    }

    let mut rows = String::new();
    for entry in entries {
        let _ = write!(
            rows,
            r#"<tr><td><input type="checkbox" name="selected" value="{id}"></td><td>{plates}</td><td>{fio}</td><td>{room}</td><td>{phone}</td></tr>"#,
            id = entry.id,
            plates = escape(&entry.plates),
            fio = escape(&entry.fio),
            room = escape(&entry.room),
            phone = escape(&entry.phone),
        );
    }

    format!(
        r#"<form method="post" action="/upload_json">
<table><tr><th></th><th>Plate</th><th>Full name</th><th>Room</th><th>Phone</th></tr>{}</table>
<button type="submit">Add selected</button>
</form>"#,
        rows
    )
}

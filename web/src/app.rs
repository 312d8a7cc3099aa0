use crate::cards::{card_key, grant_request, medal_class, outcome_text};
use crate::websocket;
use gloo_timers::callback::Timeout;
use leptos::{ev, prelude::*};
use shared::protocol::{ClientMsg, ServerMsg, Standings};
use shared::rank::search;

#[component]
pub fn App() -> impl IntoView {
    let (standings, set_standings) = signal(Standings::default());
    let (query, set_query) = signal(String::new());
    let (connected, set_connected) = signal(false);
    let (admin, set_admin) = signal(None::<String>);
    let (notice, set_notice) = signal(None::<String>);

    let (username, set_username) = signal(String::new());
    let (password, set_password) = signal(String::new());
    let (student, set_student) = signal(String::new());
    let (activity, set_activity) = signal(String::new());
    let (points, set_points) = signal("1".to_string());
    let (override_code, set_override_code) = signal(String::new());

    let flash = move |text: String| {
        set_notice.set(Some(text));
        Timeout::new(5_000, move || set_notice.set(None)).forget();
    };

    let on_message = move |msg: ServerMsg| match msg {
        ServerMsg::Standings(s) => set_standings.set(s),
        ServerMsg::LoggedIn { admin } => {
            set_password.set(String::new());
            set_admin.set(Some(admin));
        }
        ServerMsg::LoggedOut => set_admin.set(None),
        ServerMsg::GrantResult(outcome) => flash(outcome_text(&outcome)),
        ServerMsg::Error { message } => {
            web_sys::console::error_1(&message.clone().into());
            flash(message);
        }
    };

    match websocket::socket_url() {
        Some(url) => match websocket::connect(&url, on_message, move || {
            set_connected.set(false);
            set_admin.set(None);
        }) {
            Ok(()) => set_connected.set(true),
            Err(_) => web_sys::console::error_1(&"Failed to connect to WebSocket".into()),
        },
        None => web_sys::console::error_1(&"No window location".into()),
    }

    let visible = move || standings.with(|s| search(&s.entries, &query.get()));

    let login = move |_: ev::MouseEvent| {
        websocket::send(&ClientMsg::Login {
            username: username.get(),
            password: password.get(),
        });
    };

    let submit_grant = move |_: ev::MouseEvent| {
        match grant_request(&student.get(), &activity.get(), &points.get(), &override_code.get()) {
            Ok(request) => {
                if websocket::send(&ClientMsg::Grant(request)) {
                    set_override_code.set(String::new());
                } else {
                    flash("Not connected".to_string());
                }
            }
            Err(message) => flash(message),
        }
    };

    view! {
        <div class="min-h-screen bg-gray-100 p-8">
            <div class="max-w-6xl mx-auto">
                <h1 class="text-4xl font-bold text-center mb-8 text-blue-600">"Class Leaderboard"</h1>

                <div class="bg-white rounded-lg shadow-lg p-6 mb-6 flex gap-4 items-center">
                    <input
                        type="search"
                        placeholder="Search name or medal"
                        class="border rounded px-3 py-2 flex-1"
                        prop:value=query
                        on:input=move |ev| set_query.set(event_target_value(&ev))
                    />
                    <button
                        class="bg-gray-200 px-4 py-2 rounded hover:bg-gray-300"
                        on:click=move |_| {
                            websocket::send(&ClientMsg::Refresh);
                        }
                    >
                        "Refresh"
                    </button>
                    <span class="text-sm text-gray-600">
                        {move || if connected.get() { "Live" } else { "Disconnected" }}
                    </span>
                </div>

                <Show when=move || notice.get().is_some()>
                    <div class="mb-6 p-3 bg-yellow-100 border border-yellow-400 rounded">
                        {move || notice.get().unwrap_or_default()}
                    </div>
                </Show>

                <div class="grid grid-cols-2 md:grid-cols-4 gap-4 mb-8">
                    <For
                        each=visible
                        key=card_key
                        children=move |entry| {
                            view! {
                                <div class=medal_class(&entry.medal)>
                                    <div class="text-3xl font-bold">"#" {entry.rank}</div>
                                    <div class="text-lg font-semibold">{entry.name.clone()}</div>
                                    <div>{entry.score} " pts"</div>
                                    <div class="text-sm text-gray-500">"EXP " {entry.exp}</div>
                                    <div class="text-sm">{entry.medal.clone()}</div>
                                </div>
                            }
                        }
                    />
                </div>

                <div class="bg-white rounded-lg shadow-lg p-6">
                    <Show
                        when=move || admin.get().is_some()
                        fallback=move || view! {
                            <div class="flex gap-4">
                                <input
                                    type="text"
                                    placeholder="Admin"
                                    class="border rounded px-3 py-2 flex-1"
                                    prop:value=username
                                    on:input=move |ev| set_username.set(event_target_value(&ev))
                                />
                                <input
                                    type="password"
                                    placeholder="Password"
                                    class="border rounded px-3 py-2 flex-1"
                                    prop:value=password
                                    on:input=move |ev| set_password.set(event_target_value(&ev))
                                />
                                <button
                                    class="bg-blue-500 text-white px-4 py-2 rounded hover:bg-blue-600"
                                    on:click=login
                                >
                                    "Sign in"
                                </button>
                            </div>
                        }
                    >
                        <div class="flex justify-between mb-4 text-sm text-gray-600">
                            <span>"Signed in as " {move || admin.get().unwrap_or_default()}</span>
                            <button
                                class="underline"
                                on:click=move |_| {
                                    websocket::send(&ClientMsg::Logout);
                                }
                            >
                                "Sign out"
                            </button>
                        </div>
                        <div class="flex gap-4">
                            <select
                                class="border rounded px-3 py-2 flex-1"
                                on:change=move |ev| set_student.set(event_target_value(&ev))
                            >
                                <option value="">"Student"</option>
                                <For
                                    each=move || standings.with(|s| s.entries.iter().map(|e| e.name.clone()).collect::<Vec<_>>())
                                    key=|name| name.clone()
                                    children=move |name| view! { <option value=name.clone()>{name.clone()}</option> }
                                />
                            </select>
                            <select
                                class="border rounded px-3 py-2 flex-1"
                                on:change=move |ev| set_activity.set(event_target_value(&ev))
                            >
                                <option value="">"Activity"</option>
                                <For
                                    each=move || standings.with(|s| s.activities.clone())
                                    key=|label| label.clone()
                                    children=move |label| view! { <option value=label.clone()>{label.clone()}</option> }
                                />
                            </select>
                            <input
                                type="number"
                                min="1"
                                class="border rounded px-3 py-2 w-24"
                                prop:value=points
                                on:input=move |ev| set_points.set(event_target_value(&ev))
                            />
                            <input
                                type="text"
                                placeholder="Override code"
                                class="border rounded px-3 py-2 w-40"
                                prop:value=override_code
                                on:input=move |ev| set_override_code.set(event_target_value(&ev))
                            />
                            <button
                                class="bg-green-500 text-white px-4 py-2 rounded hover:bg-green-600"
                                on:click=submit_grant
                            >
                                "Add points"
                            </button>
                        </div>
                    </Show>
                </div>
            </div>
        </div>
    }
}

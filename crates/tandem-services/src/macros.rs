// Copyright 2025 Tandem Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Generates the async call methods of a client stub.
///
/// Each entry `name / name_with (args) -> Ret;` produces `name(args)` and
/// `name_with(args, &mut RpcOptions)`; the wire method name is `name`.
/// The stub must have a `client: Client` field.
macro_rules! client_methods {
    ($(
        $(#[$meta:meta])*
        $name:ident / $name_with:ident ( $($arg:ident : $ty:ty),* ) -> $ret:ty;
    )*) => {
        $(
            $(#[$meta])*
            pub async fn $name(&self, $($arg: $ty),*) -> tandem_common::Result<$ret> {
                self.$name_with($($arg,)* &mut tandem_client::RpcOptions::new()).await
            }

            pub async fn $name_with(
                &self,
                $($arg: $ty,)*
                options: &mut tandem_client::RpcOptions,
            ) -> tandem_common::Result<$ret> {
                self.client
                    .invoke(stringify!($name), &($($arg,)*), options)
                    .await
            }
        )*
    };
}

/// Implements `ServiceClient` and `Deref<Target = Client>` for a stub.
macro_rules! service_client {
    ($stub:ident, $service:expr) => {
        impl tandem_client::ServiceClient for $stub {
            const SERVICE_NAME: &'static str = $service;

            fn from_client(client: tandem_client::Client) -> Self {
                Self { client }
            }

            fn client(&self) -> &tandem_client::Client {
                &self.client
            }
        }

        impl std::ops::Deref for $stub {
            type Target = tandem_client::Client;

            fn deref(&self) -> &Self::Target {
                &self.client
            }
        }
    };
}
